//! Band condition scale
//!
//! Every mapping for the five-step condition scale (numeric value, colour,
//! label) lives here so charts, tables and prompts agree.

use serde::{Deserialize, Serialize};

/// Qualitative propagation condition of a band for one diurnal period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Condition {
    Closed,
    Poor,
    Fair,
    Good,
    Excellent,
    /// No data for this band/period
    #[default]
    Unknown,
}

/// The five reportable conditions, worst to best
pub const CONDITION_SCALE: [Condition; 5] = [
    Condition::Closed,
    Condition::Poor,
    Condition::Fair,
    Condition::Good,
    Condition::Excellent,
];

impl Condition {
    /// Parse an upstream label. Case-insensitive; N0NBH's "Band Closed"
    /// counts as closed. Anything unrecognised is `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "excellent" => Condition::Excellent,
            "good" => Condition::Good,
            "fair" => Condition::Fair,
            "poor" => Condition::Poor,
            "closed" | "band closed" => Condition::Closed,
            _ => Condition::Unknown,
        }
    }

    /// Heatmap value, 0 (closed / no data) to 4 (excellent)
    pub fn value(self) -> u8 {
        match self {
            Condition::Closed | Condition::Unknown => 0,
            Condition::Poor => 1,
            Condition::Fair => 2,
            Condition::Good => 3,
            Condition::Excellent => 4,
        }
    }

    /// Display colour used by the band matrix and its legend
    pub fn color(self) -> &'static str {
        match self {
            Condition::Excellent => "#2ecc71",
            Condition::Good => "#3498db",
            Condition::Fair => "#f1c40f",
            Condition::Poor => "#e74c3c",
            Condition::Closed | Condition::Unknown => "#2c3e50",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Condition::Excellent => "Excellent",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
            Condition::Poor => "Poor",
            Condition::Closed => "Closed",
            Condition::Unknown => "No data",
        }
    }

    pub fn is_known(self) -> bool {
        self != Condition::Unknown
    }
}

/// Numeric value for a raw condition label; unknown labels map to 0
pub fn condition_to_value(label: &str) -> u8 {
    Condition::parse(label).value()
}
