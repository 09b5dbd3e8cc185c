//! N0NBH solar-terrestrial XML (current conditions)

use async_trait::async_trait;
use serde::Deserialize;
use shared::{Condition, N0nbhBand, N0nbhRecord, SOURCE_N0NBH};

use super::{SourceFetcher, SourceHttpClient};
use crate::error::FetchError;

#[derive(Debug, Deserialize)]
struct SolarDocument {
    solardata: SolarData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SolarData {
    updated: Option<String>,
    solarflux: Option<String>,
    aindex: Option<String>,
    kindex: Option<String>,
    kindexnt: Option<String>,
    xray: Option<String>,
    sunspots: Option<String>,
    heliumline: Option<String>,
    protonflux: Option<String>,
    // Upstream spelling
    electonflux: Option<String>,
    aurora: Option<String>,
    normalization: Option<String>,
    latdegree: Option<String>,
    solarwind: Option<String>,
    magneticfield: Option<String>,
    geomagfield: Option<String>,
    signalnoise: Option<String>,
    calculatedconditions: Option<CalculatedConditions>,
}

#[derive(Debug, Default, Deserialize)]
struct CalculatedConditions {
    #[serde(default)]
    band: Vec<XmlBand>,
}

#[derive(Debug, Deserialize)]
struct XmlBand {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@time", default)]
    time: String,
    #[serde(rename = "$text", default)]
    condition: String,
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// Leading numeric value of a field; anything unparseable reads as 0
fn number(value: &Option<String>) -> f64 {
    value
        .as_deref()
        .and_then(|raw| raw.trim().split_whitespace().next())
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Pair day and night entries by band name, keeping first-seen order
fn collapse_bands(entries: Vec<XmlBand>) -> Vec<N0nbhBand> {
    let mut bands: Vec<N0nbhBand> = Vec::new();
    for entry in entries {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            continue;
        }
        let condition = Condition::parse(&entry.condition);
        let index = match bands.iter().position(|band| band.name == name) {
            Some(index) => index,
            None => {
                bands.push(N0nbhBand {
                    name,
                    day: Condition::Unknown,
                    night: Condition::Unknown,
                });
                bands.len() - 1
            }
        };
        match entry.time.trim().to_ascii_lowercase().as_str() {
            "day" => bands[index].day = condition,
            "night" => bands[index].night = condition,
            other => tracing::debug!(band = %bands[index].name, time = other, "Ignoring band entry"),
        }
    }
    bands
}

/// Parse the N0NBH document into one record
pub fn parse_n0nbh(body: &str) -> Result<N0nbhRecord, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::EmptyResponse);
    }

    let document: SolarDocument =
        quick_xml::de::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    let data = document.solardata;

    let bands = collapse_bands(
        data.calculatedconditions
            .map(|conditions| conditions.band)
            .unwrap_or_default(),
    );

    let record = N0nbhRecord {
        updated: text(&data.updated),
        solar_flux: number(&data.solarflux),
        a_index: number(&data.aindex),
        k_index: number(&data.kindex),
        k_index_nt: text(&data.kindexnt),
        xray: text(&data.xray),
        sunspots: number(&data.sunspots).round() as i64,
        helium_line: text(&data.heliumline),
        proton_flux: number(&data.protonflux),
        electron_flux: text(&data.electonflux),
        aurora: text(&data.aurora),
        normalization: text(&data.normalization),
        lat_degree: text(&data.latdegree),
        solar_wind: number(&data.solarwind),
        magnetic_field: number(&data.magneticfield),
        geomag_field: text(&data.geomagfield),
        signal_noise: text(&data.signalnoise),
        bands,
        source: SOURCE_N0NBH.to_string(),
    };

    let has_values = record.solar_flux != 0.0
        || !record.xray.is_empty()
        || data.kindex.is_some()
        || !record.bands.is_empty();
    if !has_values {
        return Err(FetchError::EmptyResponse);
    }

    Ok(record)
}

pub struct N0nbhFetcher {
    http: SourceHttpClient,
    url: String,
}

impl N0nbhFetcher {
    pub fn new(http: SourceHttpClient, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl SourceFetcher for N0nbhFetcher {
    type Output = N0nbhRecord;

    fn source_name(&self) -> &'static str {
        "n0nbh"
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError> {
        let body = self
            .http
            .get_text(&self.url, "application/xml, text/xml")
            .await?;
        parse_n0nbh(&body)
    }
}
