//! Circular gauges for the current scalar readings

use serde_json::{json, Value};
use shared::{PropagationObservation, RawSourceBundle};

use super::{ChartBuilder, ChartSnippet};
use crate::error::ChartError;

const GAUGE_HEIGHT: u32 = 260;

/// Value shown by a gauge and the text under it
struct Reading {
    value: f64,
    /// Overrides the numeric detail text, e.g. the raw X-ray class
    label: Option<String>,
}

/// Fixed-range gauge over one observation field
pub struct GaugeChart {
    id: &'static str,
    title: &'static str,
    min: f64,
    max: f64,
    unit: &'static str,
    decimals: i32,
    /// Colour bands as (fraction of range, colour)
    stops: &'static [(f64, &'static str)],
    show_axis_labels: bool,
    read: fn(&PropagationObservation) -> Reading,
}

/// Position of an X-ray class on a 0-5 log scale: A=0, B=1, C=2, M=3, X=4
pub fn xray_scale(class: &str) -> f64 {
    let class = class.trim();
    let mut chars = class.chars();
    let base = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('A') => 0.0,
        Some('B') => 1.0,
        Some('C') => 2.0,
        Some('M') => 3.0,
        Some('X') => 4.0,
        _ => return 0.0,
    };
    let magnitude = chars
        .as_str()
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|m| *m > 0.0 && m.is_finite())
        .unwrap_or(1.0);
    (base + magnitude.log10()).clamp(0.0, 5.0)
}

/// Decade of an electron flux reading (0-6)
pub fn electron_flux_scale(flux: &str) -> f64 {
    flux.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| *f > 1.0 && f.is_finite())
        .map(|f| f.log10().clamp(0.0, 6.0))
        .unwrap_or(0.0)
}

fn leading_number(text: &str) -> f64 {
    text.trim()
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

const LOW_IS_CALM: &[(f64, &str)] = &[(0.45, "#2ecc71"), (0.6, "#f1c40f"), (0.75, "#e67e22"), (1.0, "#e74c3c")];
const HIGH_IS_GOOD: &[(f64, &str)] = &[(0.2, "#e74c3c"), (0.4, "#f1c40f"), (0.6, "#3498db"), (1.0, "#2ecc71")];

/// The seven gauges, in report order
pub fn gauges() -> Vec<GaugeChart> {
    vec![
        GaugeChart {
            id: "KIndexGauge",
            title: "K-index",
            min: 0.0,
            max: 9.0,
            unit: "",
            decimals: 2,
            stops: &[(4.0 / 9.0, "#2ecc71"), (5.0 / 9.0, "#f1c40f"), (6.0 / 9.0, "#e67e22"), (1.0, "#e74c3c")],
            show_axis_labels: true,
            read: |obs| Reading {
                value: obs.geomag.k_index,
                label: None,
            },
        },
        GaugeChart {
            id: "SolarFluxGauge",
            title: "Solar Flux (10.7 cm)",
            min: 50.0,
            max: 300.0,
            unit: "sfu",
            decimals: 1,
            stops: HIGH_IS_GOOD,
            show_axis_labels: true,
            read: |obs| Reading {
                value: obs.solar.flux_10_7cm,
                label: None,
            },
        },
        GaugeChart {
            id: "SunspotGauge",
            title: "Sunspot Number",
            min: 0.0,
            max: 300.0,
            unit: "",
            decimals: 0,
            stops: HIGH_IS_GOOD,
            show_axis_labels: true,
            read: |obs| Reading {
                value: obs.solar.sunspot_number as f64,
                label: None,
            },
        },
        GaugeChart {
            id: "SolarWindGauge",
            title: "Solar Wind",
            min: 200.0,
            max: 900.0,
            unit: "km/s",
            decimals: 0,
            stops: LOW_IS_CALM,
            show_axis_labels: true,
            read: |obs| Reading {
                value: obs.solar.solar_wind_speed_kms,
                label: None,
            },
        },
        GaugeChart {
            id: "XRayGauge",
            title: "X-ray Flux",
            min: 0.0,
            max: 5.0,
            unit: "",
            decimals: 2,
            stops: &[(0.4, "#2ecc71"), (0.6, "#f1c40f"), (0.8, "#e67e22"), (1.0, "#e74c3c")],
            show_axis_labels: false,
            read: |obs| Reading {
                value: xray_scale(&obs.solar.xray_class),
                label: Some(obs.solar.xray_class.trim().to_string()),
            },
        },
        GaugeChart {
            id: "ElectronFluxGauge",
            title: "Electron Flux",
            min: 0.0,
            max: 6.0,
            unit: "",
            decimals: 2,
            stops: LOW_IS_CALM,
            show_axis_labels: false,
            read: |obs| Reading {
                value: electron_flux_scale(&obs.solar.electron_flux),
                label: Some(obs.solar.electron_flux.trim().to_string()),
            },
        },
        GaugeChart {
            id: "AuroraGauge",
            title: "Aurora",
            min: 0.0,
            max: 10.0,
            unit: "",
            decimals: 0,
            stops: LOW_IS_CALM,
            show_axis_labels: true,
            read: |obs| Reading {
                value: leading_number(&obs.solar.aurora_level),
                label: None,
            },
        },
    ]
}

impl GaugeChart {
    fn option(&self, reading: &Reading) -> Value {
        let factor = 10f64.powi(self.decimals);
        let value = if reading.value.is_finite() {
            (reading.value.clamp(self.min, self.max) * factor).round() / factor
        } else {
            self.min
        };

        let formatter = match &reading.label {
            Some(label) if !label.is_empty() => label.replace('{', "(").replace('}', ")"),
            Some(_) => "n/a".to_string(),
            None if self.unit.is_empty() => "{value}".to_string(),
            None => format!("{{value}} {}", self.unit),
        };
        let colors: Vec<Value> = self.stops.iter().map(|(at, color)| json!([at, color])).collect();

        json!({
            "series": [{
                "type": "gauge",
                "min": self.min,
                "max": self.max,
                "splitNumber": 5,
                "radius": "90%",
                "axisLine": { "lineStyle": { "width": 14, "color": colors } },
                "pointer": { "itemStyle": { "color": "auto" } },
                "axisTick": { "distance": -14, "length": 6, "lineStyle": { "color": "#fff" } },
                "splitLine": { "distance": -14, "length": 14, "lineStyle": { "color": "#fff", "width": 2 } },
                "axisLabel": { "show": self.show_axis_labels, "distance": 20, "fontSize": 10 },
                "title": { "offsetCenter": [0, "75%"], "fontSize": 12 },
                "detail": {
                    "valueAnimation": true,
                    "fontSize": 18,
                    "offsetCenter": [0, "45%"],
                    "formatter": formatter
                },
                "data": [{ "value": value, "name": self.title }]
            }]
        })
    }
}

impl ChartBuilder for GaugeChart {
    fn id(&self) -> &'static str {
        self.id
    }

    fn title(&self) -> &'static str {
        self.title
    }

    fn build(
        &self,
        observation: Option<&PropagationObservation>,
        _raw: Option<&RawSourceBundle>,
    ) -> Result<ChartSnippet, ChartError> {
        let observation = observation.ok_or(ChartError::InvalidInput)?;
        let reading = (self.read)(observation);
        Ok(ChartSnippet::from_option(self.id, self.title, GAUGE_HEIGHT, &self.option(&reading)))
    }
}
