//! Merge raw source records into one observation
//!
//! Pure: the only time input is the `now` argument, used for the observation
//! timestamp, the forecast dates and the 24 h event cutoff. Values are copied
//! as published; nothing is clamped or classified here.

use chrono::{DateTime, Duration, Utc};
use shared::{
    parse_upstream_time, BandConditions, Forecast, KIndexPoint, KIndexRecord, N0nbhRecord,
    PropagationObservation, RawSourceBundle, SidcRecord, SolarCycleRecord, SolarPoint,
    SpaceWeatherEvent, BAND_ORDER, SOURCE_N0NBH, SOURCE_NOAA, SOURCE_SIDC,
};

/// Window for SIDC entries to count as current events
const EVENT_WINDOW_HOURS: i64 = 24;

/// Bands covered by an N0NBH band family
pub fn expand_band_family(family: &str) -> Vec<&'static str> {
    match family.trim() {
        "80m-40m" => vec!["80m", "40m"],
        "30m-20m" => vec!["20m"],
        "17m-15m" => vec!["17m", "15m"],
        "12m-10m" => vec!["12m", "10m"],
        "6m" => vec!["6m"],
        other => BAND_ORDER
            .iter()
            .copied()
            .filter(|band| *band == other)
            .collect(),
    }
}

/// Record with the latest parseable time tag; the last record when none parse
fn latest<'a, T>(records: &'a [T], time_tag: impl Fn(&T) -> &str) -> Option<&'a T> {
    records
        .iter()
        .filter_map(|record| parse_upstream_time(time_tag(record)).map(|ts| (ts, record)))
        .max_by_key(|(ts, _)| *ts)
        .map(|(_, record)| record)
        .or_else(|| records.last())
}

/// Build the observation for `now` from whatever the sources returned
pub fn normalize(raw: &RawSourceBundle, now: DateTime<Utc>) -> PropagationObservation {
    let mut observation = PropagationObservation::empty(now);

    apply_solar_cycle(&mut observation, &raw.solar_cycle_records);
    apply_k_index(&mut observation, &raw.k_index_records);
    if let Some(n0nbh) = &raw.n0nbh_record {
        apply_n0nbh(&mut observation, n0nbh);
    }

    observation.history_k = k_history(&raw.k_index_records);
    observation.history_solar = solar_history(&raw.solar_cycle_records);
    observation.events = recent_events(&raw.sidc_records, now);
    observation.forecast = Forecast::starting(now.date_naive());

    observation
}

fn apply_solar_cycle(observation: &mut PropagationObservation, records: &[SolarCycleRecord]) {
    let Some(latest) = latest(records, |r| r.time_tag.as_str()) else {
        return;
    };
    let solar = &mut observation.solar;

    solar.flux_10_7cm = latest.f10_7;
    solar.flux_10_7cm_source = SOURCE_NOAA.to_string();
    solar.flux_adjusted = latest.f10_7_adjusted;
    solar.flux_adjusted_source = SOURCE_NOAA.to_string();
    solar.sunspot_number = latest.ssn.round() as i64;
    solar.sunspot_number_source = SOURCE_NOAA.to_string();
}

fn apply_k_index(observation: &mut PropagationObservation, records: &[KIndexRecord]) {
    let Some(latest) = latest(records, |r| r.time_tag.as_str()) else {
        return;
    };
    let geomag = &mut observation.geomag;

    geomag.k_index = if latest.estimated_kp > 0.0 {
        latest.estimated_kp
    } else {
        latest.observed_kp as f64
    };
    geomag.k_index_source = SOURCE_NOAA.to_string();
}

fn apply_n0nbh(observation: &mut PropagationObservation, record: &N0nbhRecord) {
    let tag = || SOURCE_N0NBH.to_string();

    let solar = &mut observation.solar;
    if solar.flux_10_7cm == 0.0 && record.solar_flux != 0.0 {
        solar.flux_10_7cm = record.solar_flux;
        solar.flux_10_7cm_source = tag();
    }
    solar.xray_class = record.xray.clone();
    solar.xray_class_source = tag();
    solar.solar_wind_speed_kms = record.solar_wind;
    solar.solar_wind_speed_kms_source = tag();
    solar.proton_flux = record.proton_flux;
    solar.proton_flux_source = tag();
    solar.electron_flux = record.electron_flux.clone();
    solar.electron_flux_source = tag();
    solar.helium_line = record.helium_line.clone();
    solar.helium_line_source = tag();
    solar.aurora_level = record.aurora.clone();
    solar.aurora_level_source = tag();

    let geomag = &mut observation.geomag;
    geomag.a_index = record.a_index;
    geomag.a_index_source = tag();
    geomag.magnetic_field_nt = record.magnetic_field;
    geomag.magnetic_field_nt_source = tag();
    geomag.lat_degree = record.lat_degree.clone();
    geomag.lat_degree_source = tag();

    for family in &record.bands {
        if !family.day.is_known() || !family.night.is_known() {
            tracing::debug!(family = %family.name, "Skipping band family without both conditions");
            continue;
        }
        for band in expand_band_family(&family.name) {
            observation.bands.insert(
                band.to_string(),
                BandConditions {
                    day_condition: family.day,
                    night_condition: family.night,
                },
            );
        }
    }
    if !observation.bands.is_empty() {
        observation.bands_source = tag();
    }
}

fn k_history(records: &[KIndexRecord]) -> Vec<KIndexPoint> {
    let mut points: Vec<KIndexPoint> = records
        .iter()
        .filter_map(|record| {
            parse_upstream_time(&record.time_tag).map(|timestamp| KIndexPoint {
                timestamp,
                k_index: record.kp_index,
                estimated_kp: record.estimated_kp,
                source: record.source.clone(),
            })
        })
        .collect();
    points.sort_by_key(|point| point.timestamp);
    points
}

fn solar_history(records: &[SolarCycleRecord]) -> Vec<SolarPoint> {
    let mut points: Vec<SolarPoint> = records
        .iter()
        .filter_map(|record| {
            parse_upstream_time(&record.time_tag).map(|timestamp| SolarPoint {
                timestamp,
                flux: record.f10_7,
                flux_adjusted: record.f10_7_adjusted,
                sunspot: record.ssn.round() as i64,
                source: record.source.clone(),
            })
        })
        .collect();
    points.sort_by_key(|point| point.timestamp);
    points
}

fn recent_events(records: &[SidcRecord], now: DateTime<Utc>) -> Vec<SpaceWeatherEvent> {
    let cutoff = now - Duration::hours(EVENT_WINDOW_HOURS);
    records
        .iter()
        .filter(|record| record.published >= cutoff)
        .map(|record| SpaceWeatherEvent {
            source: SOURCE_SIDC.to_string(),
            event_type: record.category.clone(),
            severity: String::new(),
            description: if record.description.trim().is_empty() {
                record.title.clone()
            } else {
                format!("{}: {}", record.title, record.description)
            },
            timestamp: record.published,
            impact: String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use shared::{audit_observation, Condition, N0nbhBand};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 17, 14, 30, 45).unwrap()
    }

    fn k_record(time_tag: &str, estimated: f64, observed: i64) -> KIndexRecord {
        KIndexRecord {
            time_tag: time_tag.to_string(),
            kp_index: estimated,
            estimated_kp: estimated,
            observed_kp: observed,
            kp: String::new(),
            source: SOURCE_NOAA.to_string(),
        }
    }

    fn solar_record(time_tag: &str, flux: f64, ssn: f64) -> SolarCycleRecord {
        SolarCycleRecord {
            time_tag: time_tag.to_string(),
            f10_7: flux,
            f10_7_adjusted: flux - 2.0,
            ssn,
            source: SOURCE_NOAA.to_string(),
        }
    }

    fn n0nbh() -> N0nbhRecord {
        N0nbhRecord {
            solar_flux: 95.0,
            a_index: 5.0,
            k_index: 1.0,
            xray: "A1.0".to_string(),
            solar_wind: 350.0,
            magnetic_field: 3.0,
            bands: vec![N0nbhBand {
                name: "80m-40m".to_string(),
                day: Condition::Good,
                night: Condition::Excellent,
            }],
            source: SOURCE_N0NBH.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_k_falls_back_to_observed_when_estimate_is_zero() {
        let raw = RawSourceBundle {
            k_index_records: vec![k_record("2025-09-17T14:00:00", 0.0, 3)],
            ..Default::default()
        };
        assert_eq!(normalize(&raw, now()).geomag.k_index, 3.0);
    }

    #[test]
    fn test_latest_record_wins_regardless_of_input_order() {
        let raw = RawSourceBundle {
            solar_cycle_records: vec![solar_record("2025-08", 150.0, 120.0), solar_record("2025-06", 130.0, 90.0)],
            ..Default::default()
        };
        let observation = normalize(&raw, now());
        assert_eq!(observation.solar.flux_10_7cm, 150.0);
        assert_eq!(observation.history_solar.len(), 2);
        assert!(observation.history_solar[0].timestamp < observation.history_solar[1].timestamp);
    }

    #[test]
    fn test_flux_uses_n0nbh_when_primary_missing() {
        let raw = RawSourceBundle {
            n0nbh_record: Some(n0nbh()),
            ..Default::default()
        };
        let observation = normalize(&raw, now());
        assert_eq!(observation.solar.flux_10_7cm, 95.0);
        assert_eq!(observation.solar.flux_10_7cm_source, "N0NBH");
        assert_eq!(observation.solar.sunspot_number, 0);
        assert!(observation.solar.sunspot_number_source.is_empty());
    }

    #[test]
    fn test_band_family_expansion() {
        let raw = RawSourceBundle {
            n0nbh_record: Some(n0nbh()),
            ..Default::default()
        };
        let observation = normalize(&raw, now());
        assert_eq!(observation.bands["80m"], observation.bands["40m"]);
        assert_eq!(observation.bands["80m"].day_condition, Condition::Good);
        assert_eq!(observation.bands_source, "N0NBH");
        assert_eq!(expand_band_family("30m-20m"), vec!["20m"]);
        assert_eq!(expand_band_family("VHF+"), vec!["VHF+"]);
        assert!(expand_band_family("2m-70cm").is_empty());
    }

    #[test]
    fn test_half_known_family_is_skipped() {
        let mut record = n0nbh();
        record.bands[0].night = Condition::Unknown;
        let raw = RawSourceBundle {
            n0nbh_record: Some(record),
            ..Default::default()
        };
        let observation = normalize(&raw, now());
        assert!(observation.bands.is_empty());
        assert!(observation.bands_source.is_empty());
    }

    #[test]
    fn test_unparseable_history_entries_are_dropped() {
        let raw = RawSourceBundle {
            k_index_records: vec![
                k_record("2025-09-17T12:00:00", 2.0, 2),
                k_record("not a time", 9.0, 9),
                k_record("2025-09-17T09:00:00", 1.0, 1),
            ],
            ..Default::default()
        };
        let observation = normalize(&raw, now());
        assert_eq!(observation.history_k.len(), 2);
        assert_eq!(observation.history_k[0].k_index, 1.0);
        assert_eq!(observation.geomag.k_index, 2.0);
    }

    #[test]
    fn test_event_window() {
        let sidc = |hours_ago: i64| SidcRecord {
            title: "X1.5 flare".to_string(),
            description: String::new(),
            category: "Flare".to_string(),
            value: 0.0,
            published: now() - Duration::hours(hours_ago),
            source: SOURCE_SIDC.to_string(),
        };
        let raw = RawSourceBundle {
            sidc_records: vec![sidc(2), sidc(30)],
            ..Default::default()
        };
        let events = normalize(&raw, now()).events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "SIDC");
        assert_eq!(events[0].description, "X1.5 flare");
        assert!(events[0].severity.is_empty());
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = RawSourceBundle {
            k_index_records: vec![k_record("2025-09-17T14:00:00", 2.33, 2)],
            solar_cycle_records: vec![solar_record("2025-08", 150.0, 120.0)],
            n0nbh_record: Some(n0nbh()),
            sidc_records: Vec::new(),
        };
        let first = serde_json::to_string(&normalize(&raw, now())).unwrap();
        let second = serde_json::to_string(&normalize(&raw, now())).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_provenance_holds_for_any_source_mix(
            k in proptest::option::of(0.0f64..9.0),
            flux in proptest::option::of(60.0f64..300.0),
            n0nbh_flux in proptest::option::of(0.0f64..300.0),
        ) {
            let raw = RawSourceBundle {
                k_index_records: k.map(|k| vec![k_record("2025-09-17T14:00:00", k, k.round() as i64)]).unwrap_or_default(),
                solar_cycle_records: flux.map(|f| vec![solar_record("2025-08", f, 100.0)]).unwrap_or_default(),
                n0nbh_record: n0nbh_flux.map(|f| N0nbhRecord { solar_flux: f, ..n0nbh() }),
                sidc_records: Vec::new(),
            };
            let observation = normalize(&raw, now());
            prop_assert!(audit_observation(&observation).is_empty());
        }
    }
}
