//! Narrative generation
//!
//! Formats the observation into a fixed user prompt, pairs it with the system
//! prompt template and returns the model's Markdown untouched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shared::{PropagationObservation, BAND_ORDER};

use crate::{error::LlmError, external::OpenAiClient};

/// Used when the system prompt file cannot be read
pub const FALLBACK_SYSTEM_PROMPT: &str = r#"You are an experienced amateur radio propagation analyst.
Write a daily HF/VHF propagation report in Markdown from the observation data you are given.

Structure:
1. A title line and a short executive summary.
2. Current solar and geomagnetic conditions, with activity labels you choose.
3. Band-by-band outlook for 80m, 40m, 20m, 17m, 15m, 12m, 10m, 6m and VHF+.
4. A three-day forecast naming the best and worst bands for each day.
5. Practical operating advice.

Place each of these placeholders alone on its own line where the chart belongs:
{{.SunGif}}
{{.KIndexGauge}} {{.SolarFluxGauge}} {{.SunspotGauge}} {{.SolarWindGauge}}
{{.XRayGauge}} {{.ElectronFluxGauge}} {{.AuroraGauge}}
{{.SolarActivityChart}} {{.KIndexTrendChart}} {{.BandConditionsChart}}
{{.ForecastChart}} {{.PropagationTimelineChart}}

Do not invent measurements. Do not output raw HTML."#;

/// What the narrative stage hands to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeOutput {
    pub markdown: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Writes the Markdown narrative for an observation
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, observation: &PropagationObservation) -> Result<NarrativeOutput, LlmError>;
}

/// Read the system prompt template, falling back to the built-in one
pub async fn load_system_prompt(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(prompt) if !prompt.trim().is_empty() => prompt,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "System prompt file is empty, using built-in prompt");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read system prompt, using built-in prompt");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
    }
}

fn sourced(value: String, source: &str) -> String {
    if source.is_empty() {
        "unavailable".to_string()
    } else {
        format!("{} ({})", value, source)
    }
}

fn text_or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Human-readable prompt carrying every scalar, bands, events and warnings
pub fn build_user_prompt(observation: &PropagationObservation) -> String {
    let solar = &observation.solar;
    let geomag = &observation.geomag;
    let mut lines = vec![
        format!(
            "Generate the propagation report for {} UTC.",
            observation.timestamp.format("%Y-%m-%d %H:%M")
        ),
        String::new(),
        "SOLAR CONDITIONS".to_string(),
        format!("- Solar flux (10.7 cm): {}", sourced(format!("{:.1} sfu", solar.flux_10_7cm), &solar.flux_10_7cm_source)),
        format!("- Adjusted solar flux: {}", sourced(format!("{:.1} sfu", solar.flux_adjusted), &solar.flux_adjusted_source)),
        format!("- Sunspot number: {}", sourced(solar.sunspot_number.to_string(), &solar.sunspot_number_source)),
        format!("- X-ray class: {}", sourced(text_or_dash(&solar.xray_class).to_string(), &solar.xray_class_source)),
        format!("- Solar wind speed: {}", sourced(format!("{:.0} km/s", solar.solar_wind_speed_kms), &solar.solar_wind_speed_kms_source)),
        format!("- Proton flux: {}", sourced(format!("{}", solar.proton_flux), &solar.proton_flux_source)),
        format!("- Electron flux: {}", sourced(text_or_dash(&solar.electron_flux).to_string(), &solar.electron_flux_source)),
        format!("- Helium line: {}", sourced(text_or_dash(&solar.helium_line).to_string(), &solar.helium_line_source)),
        format!("- Aurora level: {}", sourced(text_or_dash(&solar.aurora_level).to_string(), &solar.aurora_level_source)),
        String::new(),
        "GEOMAGNETIC CONDITIONS".to_string(),
        format!("- K-index: {}", sourced(format!("{:.2}", geomag.k_index), &geomag.k_index_source)),
        format!("- A-index: {}", sourced(format!("{:.0}", geomag.a_index), &geomag.a_index_source)),
        format!("- Magnetic field (Bz): {}", sourced(format!("{:.1} nT", geomag.magnetic_field_nt), &geomag.magnetic_field_nt_source)),
        format!("- Aurora latitude: {}", sourced(text_or_dash(&geomag.lat_degree).to_string(), &geomag.lat_degree_source)),
        String::new(),
        "BAND CONDITIONS (day / night)".to_string(),
    ];

    for band in BAND_ORDER {
        match observation.bands.get(band) {
            Some(conditions) => lines.push(format!(
                "- {}: {} / {}",
                band,
                conditions.day_condition.label(),
                conditions.night_condition.label()
            )),
            None => lines.push(format!("- {}: No data", band)),
        }
    }

    lines.push(String::new());
    lines.push("SPACE WEATHER EVENTS (last 24 hours)".to_string());
    if observation.events.is_empty() {
        lines.push("- None reported".to_string());
    }
    for event in &observation.events {
        lines.push(format!(
            "- [{}] {} {}: {}",
            event.timestamp.format("%Y-%m-%d %H:%M"),
            event.source,
            event.event_type,
            event.description
        ));
    }

    lines.push(String::new());
    lines.push("FORECAST WARNINGS".to_string());
    if observation.forecast.warnings.is_empty() {
        lines.push("- None".to_string());
    }
    for warning in &observation.forecast.warnings {
        lines.push(format!("- {}", warning));
    }

    let recent_k: Vec<String> = observation
        .history_k
        .iter()
        .rev()
        .take(8)
        .rev()
        .map(|point| format!("{} K={:.2}", point.timestamp.format("%m-%d %H:%M"), point.k_index))
        .collect();
    if !recent_k.is_empty() {
        lines.push(String::new());
        lines.push("RECENT K-INDEX".to_string());
        lines.push(format!("- {}", recent_k.join(", ")));
    }

    let days: Vec<String> = observation
        .forecast
        .days()
        .iter()
        .map(|day| day.date.format("%Y-%m-%d").to_string())
        .collect();
    lines.push(String::new());
    lines.push(format!("Forecast days: {}", days.join(", ")));

    lines.join("\n")
}

/// Narrative writer backed by the chat-completion API
pub struct LlmNarrator {
    client: OpenAiClient,
    system_prompt_path: PathBuf,
}

impl LlmNarrator {
    pub fn new(client: OpenAiClient, system_prompt_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            system_prompt_path: system_prompt_path.into(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for LlmNarrator {
    async fn generate(&self, observation: &PropagationObservation) -> Result<NarrativeOutput, LlmError> {
        let system_prompt = load_system_prompt(&self.system_prompt_path).await;
        let user_prompt = build_user_prompt(observation);

        tracing::info!(model = self.client.model(), "Requesting narrative");
        let markdown = self.client.chat_completion(&system_prompt, &user_prompt).await?;
        tracing::info!(chars = markdown.len(), "Narrative received");

        Ok(NarrativeOutput {
            markdown,
            system_prompt,
            user_prompt,
        })
    }
}
