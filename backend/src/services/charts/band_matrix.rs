//! 24-hour band conditions matrix

use serde_json::json;
use shared::{Condition, PropagationObservation, RawSourceBundle, BAND_ORDER, CONDITION_SCALE};

use super::{ChartBuilder, ChartSnippet};
use crate::error::ChartError;

const MATRIX_HEIGHT: u32 = 380;

/// Bands down, UTC hours across, one circle per cell
pub struct BandConditionsChart;

/// `[hour, band row, condition value]` for every cell
fn cells(observation: &PropagationObservation) -> Vec<[u32; 3]> {
    let mut cells = Vec::with_capacity(BAND_ORDER.len() * 24);
    for (row, band) in BAND_ORDER.iter().enumerate() {
        let conditions = observation.bands.get(*band);
        for hour in 0..24u32 {
            let condition = conditions
                .map(|c| c.at_hour(hour))
                .unwrap_or(Condition::Unknown);
            cells.push([hour, row as u32, u32::from(condition.value())]);
        }
    }
    cells
}

impl ChartBuilder for BandConditionsChart {
    fn id(&self) -> &'static str {
        "BandConditionsChart"
    }

    fn title(&self) -> &'static str {
        "Band Conditions (UTC)"
    }

    fn build(
        &self,
        observation: Option<&PropagationObservation>,
        _raw: Option<&RawSourceBundle>,
    ) -> Result<ChartSnippet, ChartError> {
        let observation = observation.ok_or(ChartError::InvalidInput)?;

        let hours: Vec<String> = (0..24).map(|h| format!("{:02}", h)).collect();
        let pieces: Vec<_> = CONDITION_SCALE
            .iter()
            .rev()
            .map(|c| json!({ "value": c.value(), "label": c.label(), "color": c.color() }))
            .collect();

        let option = json!({
            "tooltip": { "position": "top" },
            "grid": { "left": 60, "right": 20, "top": 20, "bottom": 70 },
            "xAxis": {
                "type": "category",
                "data": hours,
                "name": "UTC",
                "splitLine": { "show": false }
            },
            "yAxis": { "type": "category", "data": BAND_ORDER, "inverse": true },
            "visualMap": {
                "type": "piecewise",
                "dimension": 2,
                "orient": "horizontal",
                "left": "center",
                "bottom": 0,
                "pieces": pieces
            },
            "series": [{
                "name": "Conditions",
                "type": "scatter",
                "symbol": "circle",
                "symbolSize": 14,
                "data": cells(observation)
            }]
        });
        Ok(ChartSnippet::from_option(self.id(), self.title(), MATRIX_HEIGHT, &option))
    }
}
