//! Chart snippet builders
//!
//! Each builder turns an observation into a self-contained fragment: one
//! `<div>` with a stable id and one `<script>` that initialises an ECharts
//! instance into it and follows window resizes. Builders are pure and never
//! touch the observation or do I/O.

mod band_matrix;
mod forecast;
mod gauges;
mod trends;

pub use band_matrix::BandConditionsChart;
pub use forecast::{parse_k_forecast, ForecastChart, DEFAULT_K_FORECAST};
pub use gauges::{electron_flux_scale, gauges, xray_scale, GaugeChart};
pub use trends::{KIndexTrendChart, PropagationTimelineChart, SolarActivityChart};

use std::collections::BTreeMap;

use serde_json::{json, Value};
use shared::{PropagationObservation, RawSourceBundle};

use crate::error::ChartError;

/// Placeholder name to rendered HTML; failed charts map to an empty string
pub type ChartSet = BTreeMap<String, String>;

/// One rendered chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSnippet {
    pub id: String,
    pub title: String,
    pub div_html: String,
    pub script_html: String,
    pub combined_html: String,
}

impl ChartSnippet {
    /// Wrap an ECharts option object into div + script
    pub fn from_option(id: &str, title: &str, height_px: u32, option: &Value) -> Self {
        let element_id = format!("chart-{}", id);
        let option_json = serde_json::to_string(option)
            .unwrap_or_else(|_| "{}".to_string())
            .replace("</", "<\\/");

        let div_html = format!(
            r#"<div id="{}" class="chart-container" title="{}" style="width:100%;height:{}px;"></div>"#,
            element_id,
            html_escape::encode_double_quoted_attribute(title),
            height_px
        );
        let script_html = format!(
            "<script>(function(){{var el=document.getElementById('{}');\
if(!el||typeof echarts==='undefined'){{return;}}\
var chart=echarts.init(el);chart.setOption({});\
window.addEventListener('resize',function(){{chart.resize();}});}})();</script>",
            element_id, option_json
        );
        let combined_html = format!("{}\n{}", div_html, script_html);

        Self {
            id: id.to_string(),
            title: title.to_string(),
            div_html,
            script_html,
            combined_html,
        }
    }
}

/// A named chart that can be rendered from an observation
pub trait ChartBuilder: Send + Sync {
    /// Placeholder name, e.g. `KIndexGauge`
    fn id(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn build(
        &self,
        observation: Option<&PropagationObservation>,
        raw: Option<&RawSourceBundle>,
    ) -> Result<ChartSnippet, ChartError>;
}

/// Every chart the report can embed
pub fn all_builders() -> Vec<Box<dyn ChartBuilder>> {
    let mut builders: Vec<Box<dyn ChartBuilder>> = gauges()
        .into_iter()
        .map(|gauge| Box::new(gauge) as Box<dyn ChartBuilder>)
        .collect();
    builders.push(Box::new(SolarActivityChart));
    builders.push(Box::new(KIndexTrendChart));
    builders.push(Box::new(BandConditionsChart));
    builders.push(Box::new(ForecastChart));
    builders.push(Box::new(PropagationTimelineChart));
    builders
}

/// Render every chart; a failing builder contributes empty HTML
pub fn build_all(
    observation: Option<&PropagationObservation>,
    raw: Option<&RawSourceBundle>,
) -> ChartSet {
    all_builders()
        .iter()
        .map(|builder| {
            let html = match builder.build(observation, raw) {
                Ok(snippet) => snippet.combined_html,
                Err(err) => {
                    tracing::warn!(chart = builder.id(), error = %err, "Chart skipped");
                    String::new()
                }
            };
            (builder.id().to_string(), html)
        })
        .collect()
}

/// Colour scale for K values shared by the K charts
pub(crate) fn k_index_visual_map() -> Value {
    json!({
        "show": false,
        "pieces": [
            { "lt": 4, "color": "#2ecc71" },
            { "gte": 4, "lt": 5, "color": "#f1c40f" },
            { "gte": 5, "lt": 6, "color": "#e67e22" },
            { "gte": 6, "color": "#e74c3c" }
        ]
    })
}

/// Clamp a K value into the 0-9 display range
pub(crate) fn display_k(value: f64) -> f64 {
    if value.is_finite() {
        (value.clamp(0.0, 9.0) * 100.0).round() / 100.0
    } else {
        0.0
    }
}
