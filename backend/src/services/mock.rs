//! Built-in sample dataset
//!
//! Backs mockup mode and the chart test page: realistic raw records for all
//! four sources, their normalised observation with the narrative labels
//! filled in, and a canned Markdown narrative that uses every placeholder.

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use shared::{
    Condition, KIndexRecord, N0nbhBand, N0nbhRecord, PropagationObservation, RawSourceBundle,
    SidcRecord, SolarCycleRecord, SOURCE_N0NBH, SOURCE_NOAA, SOURCE_SIDC,
};

use super::normalizer::normalize;

/// Canned narrative in the shape the system prompt asks for
pub const MOCK_MARKDOWN: &str = r#"# HF Propagation Report

## Executive Summary

Geomagnetic conditions are **quiet to unsettled** with a K-index near 2. Solar flux is elevated, which keeps the higher HF bands open through the daylight hours.

{{.SunGif}}

## Current Conditions

{{.KIndexGauge}} {{.SolarFluxGauge}} {{.SunspotGauge}} {{.SolarWindGauge}}

{{.XRayGauge}} {{.ElectronFluxGauge}} {{.AuroraGauge}}

{{.SolarActivityChart}}

{{.KIndexTrendChart}}

## Band Outlook

{{.BandConditionsChart}}

| Band | Day | Night |
|------|-----|-------|
| 80m-40m | Good | Excellent |
| 20m | Good | Fair |
| 17m-15m | Excellent | Fair |
| 12m-10m | Good | Poor |

## Forecast

{{.ForecastChart}}

{{.PropagationTimelineChart}}

- **Today:** stable, best on 20m and 17m.
- **Tomorrow:** a minor disturbance may raise K to 4 late in the day.
- **Day after:** recovery expected.

## Operating Advice

Work 15m and 17m around local noon; move to 40m and 80m after sunset.
"#;

/// Sample data for one run at `now`
#[derive(Debug, Clone)]
pub struct MockBundle {
    pub observation: PropagationObservation,
    pub raw: RawSourceBundle,
    pub markdown: String,
}

fn k_index_records(now: DateTime<Utc>) -> Vec<KIndexRecord> {
    let pattern: [f64; 8] = [1.33, 1.67, 2.0, 2.33, 2.67, 3.0, 2.33, 2.0];
    (0..24)
        .rev()
        .enumerate()
        .map(|(i, back)| {
            let ts = now - Duration::hours(3 * back);
            let kp = pattern[i % pattern.len()];
            KIndexRecord {
                time_tag: ts.format("%Y-%m-%dT%H:00:00").to_string(),
                kp_index: kp,
                estimated_kp: kp,
                observed_kp: kp.round() as i64,
                kp: format!("{}Z", kp.round() as i64),
                source: SOURCE_NOAA.to_string(),
            }
        })
        .collect()
}

fn solar_cycle_records(now: DateTime<Utc>) -> Vec<SolarCycleRecord> {
    let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    (0..40u32)
        .rev()
        .filter_map(|back| first.checked_sub_months(Months::new(back + 1)).map(|month| (back, month)))
        .map(|(back, month)| {
            let phase = f64::from(40 - back);
            SolarCycleRecord {
                time_tag: month.format("%Y-%m").to_string(),
                f10_7: 120.0 + phase * 1.5 + (phase * 0.7).sin() * 12.0,
                f10_7_adjusted: 118.0 + phase * 1.5,
                ssn: 70.0 + phase * 1.8 + (phase * 0.5).cos() * 10.0,
                source: SOURCE_NOAA.to_string(),
            }
        })
        .collect()
}

fn band(name: &str, day: Condition, night: Condition) -> N0nbhBand {
    N0nbhBand {
        name: name.to_string(),
        day,
        night,
    }
}

fn n0nbh_record(now: DateTime<Utc>) -> N0nbhRecord {
    N0nbhRecord {
        updated: now.format("%d %b %Y %H%M GMT").to_string(),
        solar_flux: 182.0,
        a_index: 8.0,
        k_index: 2.0,
        k_index_nt: "No Report".to_string(),
        xray: "C2.4".to_string(),
        sunspots: 145,
        helium_line: "142.3".to_string(),
        proton_flux: 12.0,
        electron_flux: "1450".to_string(),
        aurora: "2".to_string(),
        normalization: "1.99".to_string(),
        lat_degree: "66.5".to_string(),
        solar_wind: 412.5,
        magnetic_field: -1.8,
        geomag_field: "QUIET".to_string(),
        signal_noise: "S1-S2".to_string(),
        bands: vec![
            band("80m-40m", Condition::Good, Condition::Excellent),
            band("30m-20m", Condition::Good, Condition::Fair),
            band("17m-15m", Condition::Excellent, Condition::Fair),
            band("12m-10m", Condition::Good, Condition::Poor),
            band("6m", Condition::Poor, Condition::Closed),
        ],
        source: SOURCE_N0NBH.to_string(),
    }
}

fn sidc_records(now: DateTime<Utc>) -> Vec<SidcRecord> {
    vec![
        SidcRecord {
            title: "Monthly Sunspot Number: 152.3".to_string(),
            description: "Monthly mean total sunspot number 152.3 (std dev 24.1, provisional)".to_string(),
            category: "Monthly Sunspot Number".to_string(),
            value: 152.3,
            published: now - Duration::days(40),
            source: SOURCE_SIDC.to_string(),
        },
        SidcRecord {
            title: "C2.4 flare".to_string(),
            description: "C-class flare from region 4217, no associated CME".to_string(),
            category: "Flare".to_string(),
            value: 2.4,
            published: now - Duration::hours(5),
            source: SOURCE_SIDC.to_string(),
        },
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Labels the narrative writer would normally provide
fn label(observation: &mut PropagationObservation) {
    observation.solar.activity_label = "Moderate".to_string();
    observation.geomag.activity_label = "Quiet".to_string();
    observation.geomag.conditions_label = "Good".to_string();

    let forecast = &mut observation.forecast;
    let days = [
        (&mut forecast.today, "2-3", "Moderate", "Good", "Fair"),
        (&mut forecast.tomorrow, "2.7-4.7", "Moderate", "Fair", "Poor"),
        (&mut forecast.day_after, "2.0", "Low", "Good", "Fair"),
    ];
    for (day, k, solar, hf, vhf) in days {
        day.k_index_forecast = k.to_string();
        day.solar_activity = solar.to_string();
        day.hf_conditions = hf.to_string();
        day.vhf_conditions = vhf.to_string();
        day.best_bands = strings(&["20m", "17m", "15m"]);
        day.worst_bands = strings(&["6m", "VHF+"]);
    }
    forecast.warnings = strings(&["Minor geomagnetic disturbance possible late tomorrow"]);

    for event in &mut observation.events {
        event.severity = "Minor".to_string();
        event.impact = "Brief absorption on the sunlit side".to_string();
    }
}

/// Sample raw records, their observation and the canned narrative
pub fn load_mock_bundle(now: DateTime<Utc>) -> MockBundle {
    let raw = RawSourceBundle {
        k_index_records: k_index_records(now),
        solar_cycle_records: solar_cycle_records(now),
        n0nbh_record: Some(n0nbh_record(now)),
        sidc_records: sidc_records(now),
    };
    let mut observation = normalize(&raw, now);
    label(&mut observation);

    MockBundle {
        observation,
        raw,
        markdown: MOCK_MARKDOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::audit_observation;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 17, 14, 30, 45).unwrap()
    }

    #[test]
    fn test_mock_observation_is_complete() {
        let bundle = load_mock_bundle(now());
        let obs = &bundle.observation;

        assert_eq!(obs.timestamp, now());
        assert_eq!(obs.history_k.len(), 24);
        assert_eq!(obs.history_solar.len(), 40);
        assert_eq!(obs.bands.len(), 8);
        assert_eq!(obs.events.len(), 1);
        assert_eq!(obs.solar.flux_10_7cm_source, SOURCE_NOAA);
        assert_eq!(obs.forecast.tomorrow.k_index_forecast, "2.7-4.7");
        assert!(audit_observation(obs).is_empty());
    }

    #[test]
    fn test_mock_markdown_uses_every_chart() {
        for builder in crate::services::charts::all_builders() {
            let placeholder = format!("{{{{.{}}}}}", builder.id());
            assert!(MOCK_MARKDOWN.contains(&placeholder), "{}", placeholder);
        }
        assert!(MOCK_MARKDOWN.contains("{{.SunGif}}"));
    }
}
