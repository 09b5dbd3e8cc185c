//! Raw upstream records
//!
//! What each fetcher returns after parsing its wire format. They are kept
//! alongside the normalised observation for debugging and persisted verbatim
//! in the report bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Condition;

/// One planetary K-index sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KIndexRecord {
    pub time_tag: String,
    /// Canonical K value; equal to `estimated_kp`
    pub kp_index: f64,
    pub estimated_kp: f64,
    /// Integer `kp_index` as published upstream
    pub observed_kp: i64,
    /// Upstream Kp label such as `"2M"`
    pub kp: String,
    pub source: String,
}

/// One month of the observed solar cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarCycleRecord {
    pub time_tag: String,
    #[serde(rename = "f10.7")]
    pub f10_7: f64,
    #[serde(rename = "f10.7_adj")]
    pub f10_7_adjusted: f64,
    pub ssn: f64,
    pub source: String,
}

/// Current conditions from the N0NBH solar XML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct N0nbhRecord {
    pub updated: String,
    pub solar_flux: f64,
    pub a_index: f64,
    pub k_index: f64,
    pub k_index_nt: String,
    pub xray: String,
    pub sunspots: i64,
    pub helium_line: String,
    pub proton_flux: f64,
    pub electron_flux: String,
    pub aurora: String,
    pub normalization: String,
    pub lat_degree: String,
    pub solar_wind: f64,
    pub magnetic_field: f64,
    pub geomag_field: String,
    pub signal_noise: String,
    /// One entry per band family, day and night collapsed
    pub bands: Vec<N0nbhBand>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N0nbhBand {
    /// Band family as published, e.g. `80m-40m`
    pub name: String,
    pub day: Condition,
    pub night: Condition,
}

/// One SIDC bulletin entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidcRecord {
    pub title: String,
    pub description: String,
    pub category: String,
    pub value: f64,
    pub published: DateTime<Utc>,
    pub source: String,
}

/// Everything the fetch coordinator collected for one run.
///
/// A failed source leaves its slot empty (or `None` for N0NBH).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSourceBundle {
    pub k_index_records: Vec<KIndexRecord>,
    pub solar_cycle_records: Vec<SolarCycleRecord>,
    pub n0nbh_record: Option<N0nbhRecord>,
    pub sidc_records: Vec<SidcRecord>,
}

impl RawSourceBundle {
    /// Number of upstream records across all sources
    pub fn record_count(&self) -> usize {
        self.k_index_records.len()
            + self.solar_cycle_records.len()
            + usize::from(self.n0nbh_record.is_some())
            + self.sidc_records.len()
    }

    /// Whether at least one of K-index, solar cycle or N0NBH came back
    pub fn has_core_data(&self) -> bool {
        !self.k_index_records.is_empty()
            || !self.solar_cycle_records.is_empty()
            || self.n0nbh_record.is_some()
    }
}
