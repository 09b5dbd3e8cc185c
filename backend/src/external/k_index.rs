//! NOAA SWPC planetary K-index feed (JSON array)

use async_trait::async_trait;
use serde::Deserialize;
use shared::{KIndexRecord, SOURCE_NOAA};

use super::{SourceFetcher, SourceHttpClient};
use crate::error::FetchError;

/// Entries kept from the tail of the feed
const KEEP_LAST: usize = 24;

#[derive(Debug, Deserialize)]
struct UpstreamKIndex {
    time_tag: String,
    #[serde(default)]
    kp_index: Option<f64>,
    #[serde(default)]
    estimated_kp: Option<f64>,
    #[serde(default)]
    kp: Option<String>,
}

/// Parse the feed body into the last 24 records.
///
/// `estimated_kp` is the canonical K; the integer `kp_index` is kept as
/// `observed_kp`.
pub fn parse_k_index(body: &str) -> Result<Vec<KIndexRecord>, FetchError> {
    let entries: Vec<UpstreamKIndex> =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let skip = entries.len().saturating_sub(KEEP_LAST);
    let records: Vec<KIndexRecord> = entries
        .into_iter()
        .skip(skip)
        .map(|entry| {
            let observed = entry.kp_index.unwrap_or(0.0);
            let estimated = entry.estimated_kp.unwrap_or(observed);
            KIndexRecord {
                time_tag: entry.time_tag,
                kp_index: estimated,
                estimated_kp: estimated,
                observed_kp: observed.round() as i64,
                kp: entry.kp.unwrap_or_default(),
                source: SOURCE_NOAA.to_string(),
            }
        })
        .collect();

    if records.is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    Ok(records)
}

pub struct KIndexFetcher {
    http: SourceHttpClient,
    url: String,
}

impl KIndexFetcher {
    pub fn new(http: SourceHttpClient, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl SourceFetcher for KIndexFetcher {
    type Output = Vec<KIndexRecord>;

    fn source_name(&self) -> &'static str {
        "noaa_k_index"
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError> {
        let body = self.http.get_text(&self.url, "application/json").await?;
        parse_k_index(&body)
    }
}
