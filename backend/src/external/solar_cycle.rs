//! NOAA SWPC observed solar-cycle indices (JSON array, monthly)

use async_trait::async_trait;
use serde::Deserialize;
use shared::{SolarCycleRecord, SOURCE_NOAA};

use super::{SourceFetcher, SourceHttpClient};
use crate::error::FetchError;

/// Substituted for a negative F10.7 when the sunspot number is usable
pub const QUIET_SUN_FLUX: f64 = 100.0;

#[derive(Debug, Deserialize)]
struct UpstreamSolarCycle {
    #[serde(rename = "time-tag", alias = "time_tag")]
    time_tag: String,
    #[serde(rename = "f10.7", default)]
    f10_7: Option<f64>,
    #[serde(rename = "f10.7_adj", default)]
    f10_7_adjusted: Option<f64>,
    #[serde(default)]
    ssn: Option<f64>,
}

/// Parse the feed, applying the sentinel rules for negative values.
///
/// Missing numbers count as negative. On a repeated `time_tag` the later
/// entry replaces the earlier one at its original position.
pub fn parse_solar_cycle(body: &str) -> Result<Vec<SolarCycleRecord>, FetchError> {
    let entries: Vec<UpstreamSolarCycle> =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut records: Vec<SolarCycleRecord> = Vec::with_capacity(entries.len());
    for entry in entries {
        let flux = entry.f10_7.unwrap_or(-1.0);
        let ssn = entry.ssn.unwrap_or(-1.0);
        if flux < 0.0 && ssn < 0.0 {
            continue;
        }

        let record = SolarCycleRecord {
            time_tag: entry.time_tag,
            f10_7: if flux < 0.0 { QUIET_SUN_FLUX } else { flux },
            f10_7_adjusted: entry.f10_7_adjusted.unwrap_or(0.0).max(0.0),
            ssn: ssn.max(0.0),
            source: SOURCE_NOAA.to_string(),
        };

        match records.iter_mut().find(|r| r.time_tag == record.time_tag) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    if records.is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    Ok(records)
}

pub struct SolarCycleFetcher {
    http: SourceHttpClient,
    url: String,
}

impl SolarCycleFetcher {
    pub fn new(http: SourceHttpClient, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl SourceFetcher for SolarCycleFetcher {
    type Output = Vec<SolarCycleRecord>;

    fn source_name(&self) -> &'static str {
        "noaa_solar_cycle"
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError> {
        let body = self.http.get_text(&self.url, "application/json").await?;
        parse_solar_cycle(&body)
    }
}
