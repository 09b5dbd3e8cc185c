//! Three-day K-index forecast bars

use serde_json::json;
use shared::{PropagationObservation, RawSourceBundle};

use super::{display_k, k_index_visual_map, ChartBuilder, ChartSnippet};
use crate::error::ChartError;

const FORECAST_HEIGHT: u32 = 300;

/// Value used when a forecast string holds no number
pub const DEFAULT_K_FORECAST: f64 = 2.0;

/// Numeric K from a forecast string.
///
/// `"N.N-M.M"` and `"N-M"` give the midpoint, anything else its first
/// number, and text without a number gives [`DEFAULT_K_FORECAST`].
pub fn parse_k_forecast(input: &str) -> f64 {
    let trimmed = input.trim();

    if let Some((low, high)) = trimmed.split_once('-') {
        if let (Ok(low), Ok(high)) = (low.trim().parse::<f64>(), high.trim().parse::<f64>()) {
            let mid = (low + high) / 2.0;
            if mid.is_finite() {
                return mid;
            }
        }
    }

    first_number(trimmed).unwrap_or(DEFAULT_K_FORECAST)
}

/// First run of digits, with at most one decimal part
fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];

    let mut end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if rest[end..].starts_with('.') {
        let fraction = rest[end + 1..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len() - end - 1);
        if fraction > 0 {
            end += 1 + fraction;
        }
    }
    rest[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

pub struct ForecastChart;

impl ChartBuilder for ForecastChart {
    fn id(&self) -> &'static str {
        "ForecastChart"
    }

    fn title(&self) -> &'static str {
        "3-Day K-index Forecast"
    }

    fn build(
        &self,
        observation: Option<&PropagationObservation>,
        _raw: Option<&RawSourceBundle>,
    ) -> Result<ChartSnippet, ChartError> {
        let observation = observation.ok_or(ChartError::InvalidInput)?;
        let days = observation.forecast.days();

        let labels: Vec<String> = days.iter().map(|d| d.date.format("%a %d %b").to_string()).collect();
        let values: Vec<f64> = days
            .iter()
            .map(|d| display_k(parse_k_forecast(&d.k_index_forecast)))
            .collect();

        let option = json!({
            "tooltip": { "trigger": "axis" },
            "grid": { "left": 40, "right": 20, "bottom": 40 },
            "xAxis": { "type": "category", "data": labels },
            "yAxis": { "type": "value", "min": 0, "max": 9, "interval": 1, "name": "Kp" },
            "visualMap": k_index_visual_map(),
            "series": [{
                "name": "Forecast K",
                "type": "bar",
                "barWidth": "40%",
                "label": { "show": true, "position": "top" },
                "data": values
            }]
        });
        Ok(ChartSnippet::from_option(self.id(), self.title(), FORECAST_HEIGHT, &option))
    }
}
