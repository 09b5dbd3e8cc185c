//! Time-series charts: solar activity, K-index trend, propagation timeline

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use shared::{parse_upstream_time, PropagationObservation, RawSourceBundle};

use super::{display_k, k_index_visual_map, ChartBuilder, ChartSnippet};
use crate::error::ChartError;

const TREND_HEIGHT: u32 = 340;
/// Months of solar history shown
const SOLAR_MONTHS: usize = 36;
const SYNTHETIC_SOLAR_POINTS: i64 = 6;
const SYNTHETIC_K_POINTS: i64 = 8;

fn axis_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// F10.7 and sunspot number on two axes
pub struct SolarActivityChart;

impl SolarActivityChart {
    fn series(observation: &PropagationObservation) -> (Vec<String>, Vec<f64>, Vec<i64>) {
        if observation.history_solar.is_empty() {
            // Flat trailing series from the current reading, one point per month
            let solar = &observation.solar;
            return (0..SYNTHETIC_SOLAR_POINTS)
                .rev()
                .map(|back| {
                    let ts = observation.timestamp - Duration::days(30 * back);
                    (ts.format("%Y-%m").to_string(), solar.flux_10_7cm, solar.sunspot_number)
                })
                .fold((Vec::new(), Vec::new(), Vec::new()), |mut acc, (label, flux, ssn)| {
                    acc.0.push(label);
                    acc.1.push(flux);
                    acc.2.push(ssn);
                    acc
                });
        }

        let skip = observation.history_solar.len().saturating_sub(SOLAR_MONTHS);
        let recent = &observation.history_solar[skip..];
        (
            recent.iter().map(|p| p.timestamp.format("%Y-%m").to_string()).collect(),
            recent.iter().map(|p| p.flux).collect(),
            recent.iter().map(|p| p.sunspot).collect(),
        )
    }
}

impl ChartBuilder for SolarActivityChart {
    fn id(&self) -> &'static str {
        "SolarActivityChart"
    }

    fn title(&self) -> &'static str {
        "Solar Activity"
    }

    fn build(
        &self,
        observation: Option<&PropagationObservation>,
        _raw: Option<&RawSourceBundle>,
    ) -> Result<ChartSnippet, ChartError> {
        let observation = observation.ok_or(ChartError::InvalidInput)?;
        let (labels, flux, sunspots) = Self::series(observation);

        let option = json!({
            "tooltip": { "trigger": "axis" },
            "legend": { "data": ["Solar Flux (sfu)", "Sunspot Number"] },
            "grid": { "left": 50, "right": 50, "bottom": 40 },
            "xAxis": { "type": "category", "data": labels },
            "yAxis": [
                { "type": "value", "name": "sfu", "scale": true },
                { "type": "value", "name": "SSN", "scale": true }
            ],
            "series": [
                {
                    "name": "Solar Flux (sfu)",
                    "type": "line",
                    "smooth": true,
                    "yAxisIndex": 0,
                    "data": flux,
                    "itemStyle": { "color": "#f39c12" }
                },
                {
                    "name": "Sunspot Number",
                    "type": "line",
                    "smooth": true,
                    "yAxisIndex": 1,
                    "data": sunspots,
                    "itemStyle": { "color": "#8e44ad" }
                }
            ]
        });
        Ok(ChartSnippet::from_option(self.id(), self.title(), TREND_HEIGHT, &option))
    }
}

/// Recent K values, or a flat series at the current K every 3 h
fn k_series(observation: &PropagationObservation) -> Vec<(String, f64)> {
    if observation.history_k.is_empty() {
        let k = observation.geomag.k_index;
        return (0..SYNTHETIC_K_POINTS)
            .rev()
            .map(|back| {
                let ts = observation.timestamp - Duration::hours(3 * back);
                (axis_time(&ts), display_k(k))
            })
            .collect();
    }

    observation
        .history_k
        .iter()
        .map(|point| (axis_time(&point.timestamp), display_k(point.k_index)))
        .collect()
}

/// K-index bars coloured by storm level
pub struct KIndexTrendChart;

impl ChartBuilder for KIndexTrendChart {
    fn id(&self) -> &'static str {
        "KIndexTrendChart"
    }

    fn title(&self) -> &'static str {
        "K-index Trend"
    }

    fn build(
        &self,
        observation: Option<&PropagationObservation>,
        _raw: Option<&RawSourceBundle>,
    ) -> Result<ChartSnippet, ChartError> {
        let observation = observation.ok_or(ChartError::InvalidInput)?;
        let (labels, values): (Vec<String>, Vec<f64>) = k_series(observation).into_iter().unzip();

        let option = json!({
            "tooltip": { "trigger": "axis" },
            "grid": { "left": 40, "right": 20, "bottom": 60 },
            "xAxis": { "type": "category", "data": labels, "axisLabel": { "rotate": 45, "fontSize": 10 } },
            "yAxis": { "type": "value", "min": 0, "max": 9, "interval": 1 },
            "visualMap": k_index_visual_map(),
            "series": [{
                "name": "K-index",
                "type": "bar",
                "data": values,
                "markLine": {
                    "silent": true,
                    "symbol": "none",
                    "lineStyle": { "type": "dashed", "color": "#e74c3c" },
                    "data": [{ "yAxis": 5, "name": "Storm" }]
                }
            }]
        });
        Ok(ChartSnippet::from_option(self.id(), self.title(), TREND_HEIGHT, &option))
    }
}

/// K-index as a continuous line with the published integer Kp alongside
pub struct PropagationTimelineChart;

impl PropagationTimelineChart {
    /// Integer Kp from the raw feed, when the K-index source came back
    fn observed(raw: Option<&RawSourceBundle>) -> Vec<Value> {
        raw.map(|raw| {
            raw.k_index_records
                .iter()
                .filter_map(|record| {
                    parse_upstream_time(&record.time_tag)
                        .map(|ts| json!([axis_time(&ts), display_k(record.observed_kp as f64)]))
                })
                .collect()
        })
        .unwrap_or_default()
    }
}

impl ChartBuilder for PropagationTimelineChart {
    fn id(&self) -> &'static str {
        "PropagationTimelineChart"
    }

    fn title(&self) -> &'static str {
        "Propagation Timeline"
    }

    fn build(
        &self,
        observation: Option<&PropagationObservation>,
        raw: Option<&RawSourceBundle>,
    ) -> Result<ChartSnippet, ChartError> {
        let observation = observation.ok_or(ChartError::InvalidInput)?;
        let estimated: Vec<Value> = k_series(observation)
            .into_iter()
            .map(|(label, value)| json!([label, value]))
            .collect();

        let mut series = vec![json!({
            "name": "Estimated Kp",
            "type": "line",
            "smooth": true,
            "showSymbol": false,
            "areaStyle": { "opacity": 0.15 },
            "data": estimated
        })];
        let observed = Self::observed(raw);
        if !observed.is_empty() {
            series.push(json!({
                "name": "Observed Kp",
                "type": "line",
                "step": "end",
                "showSymbol": false,
                "lineStyle": { "type": "dotted" },
                "data": observed
            }));
        }

        let mut visual_map = k_index_visual_map();
        visual_map["seriesIndex"] = json!(0);

        let option = json!({
            "tooltip": { "trigger": "axis" },
            "legend": {},
            "grid": { "left": 40, "right": 20, "bottom": 40 },
            "xAxis": { "type": "category", "boundaryGap": false },
            "yAxis": { "type": "value", "min": 0, "max": 9, "interval": 1 },
            "visualMap": visual_map,
            "series": series
        });
        Ok(ChartSnippet::from_option(self.id(), self.title(), TREND_HEIGHT, &option))
    }
}
