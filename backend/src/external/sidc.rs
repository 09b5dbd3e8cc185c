//! SIDC/SILSO monthly sunspot number (semicolon-separated CSV)
//!
//! Columns: year; month; decimal date; mean; standard deviation;
//! observations; definitive marker.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use shared::{SidcRecord, SOURCE_SIDC};

use super::{SourceFetcher, SourceHttpClient};
use crate::error::FetchError;

/// Lines kept from the tail of the file
const KEEP_LAST: usize = 100;
const CATEGORY: &str = "Monthly Sunspot Number";

fn field<T: std::str::FromStr>(row: &StringRecord, index: usize) -> Option<T> {
    row.get(index).and_then(|value| value.trim().parse().ok())
}

fn to_record(row: &StringRecord) -> Option<SidcRecord> {
    let year: i32 = field(row, 0)?;
    let month: u32 = field(row, 1)?;
    let value: f64 = field(row, 3)?;
    let published = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;

    let std_dev: Option<f64> = field(row, 4);
    let observations: Option<i64> = field(row, 5);
    let definitive = row.get(6).map(str::trim) == Some("1");

    let mut description = format!("Mean total sunspot number for {}-{:02} was {:.1}", year, month, value);
    if let Some(sd) = std_dev.filter(|sd| *sd >= 0.0) {
        description.push_str(&format!(" (std dev {:.1}", sd));
        if let Some(n) = observations.filter(|n| *n >= 0) {
            description.push_str(&format!(", {} observations", n));
        }
        description.push(')');
    }
    description.push_str(if definitive { "; definitive" } else { "; provisional" });

    Some(SidcRecord {
        title: format!("{}: {:.1}", CATEGORY, value),
        description,
        category: CATEGORY.to_string(),
        value,
        published,
        source: SOURCE_SIDC.to_string(),
    })
}

/// Parse the last 100 data lines; unparseable lines are skipped
pub fn parse_sidc_csv(body: &str) -> Result<Vec<SidcRecord>, FetchError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let rows: Vec<StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .map_err(|e| FetchError::Parse(e.to_string()))?;
    let rows: Vec<&StringRecord> = rows
        .iter()
        .filter(|row| row.iter().any(|value| !value.is_empty()))
        .collect();

    if rows.is_empty() {
        return Err(FetchError::EmptyResponse);
    }

    let skip = rows.len().saturating_sub(KEEP_LAST);
    let records: Vec<SidcRecord> = rows.into_iter().skip(skip).filter_map(to_record).collect();

    if records.is_empty() {
        return Err(FetchError::Parse("no parseable sunspot lines".to_string()));
    }
    Ok(records)
}

pub struct SidcFetcher {
    http: SourceHttpClient,
    url: String,
}

impl SidcFetcher {
    pub fn new(http: SourceHttpClient, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl SourceFetcher for SidcFetcher {
    type Output = Vec<SidcRecord>;

    fn source_name(&self) -> &'static str {
        "sidc"
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError> {
        let body = self.http.get_text(&self.url, "text/csv, text/plain").await?;
        parse_sidc_csv(&body)
    }
}
