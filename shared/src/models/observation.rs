//! Normalised propagation observation
//!
//! Every scalar that can come from more than one upstream source carries a
//! companion `*_source` field naming where the value was read. Qualitative
//! labels (`activity_label`, forecast fields, event severity) are left empty
//! by the normaliser and filled in by the narrative writer.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Condition;

/// Root normalised entity for one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationObservation {
    pub timestamp: DateTime<Utc>,
    pub solar: SolarConditions,
    pub geomag: GeomagConditions,
    /// Band name to day/night condition
    pub bands: BTreeMap<String, BandConditions>,
    pub bands_source: String,
    pub forecast: Forecast,
    pub events: Vec<SpaceWeatherEvent>,
    pub history_k: Vec<KIndexPoint>,
    pub history_solar: Vec<SolarPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolarConditions {
    pub flux_10_7cm: f64,
    pub flux_10_7cm_source: String,
    pub flux_adjusted: f64,
    pub flux_adjusted_source: String,
    pub sunspot_number: i64,
    pub sunspot_number_source: String,
    pub xray_class: String,
    pub xray_class_source: String,
    pub solar_wind_speed_kms: f64,
    pub solar_wind_speed_kms_source: String,
    pub proton_flux: f64,
    pub proton_flux_source: String,
    pub electron_flux: String,
    pub electron_flux_source: String,
    pub helium_line: String,
    pub helium_line_source: String,
    pub aurora_level: String,
    pub aurora_level_source: String,
    pub activity_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeomagConditions {
    pub k_index: f64,
    pub k_index_source: String,
    pub a_index: f64,
    pub a_index_source: String,
    pub magnetic_field_nt: f64,
    pub magnetic_field_nt_source: String,
    pub lat_degree: String,
    pub lat_degree_source: String,
    pub activity_label: String,
    pub conditions_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConditions {
    pub day_condition: Condition,
    pub night_condition: Condition,
}

impl BandConditions {
    /// Condition in effect at a UTC hour: day for 06:00-17:59, night otherwise
    pub fn at_hour(&self, hour: u32) -> Condition {
        if (6..18).contains(&hour) {
            self.day_condition
        } else {
            self.night_condition
        }
    }
}

/// Three-day outlook; every label is written by the narrative writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub today: ForecastDay,
    pub tomorrow: ForecastDay,
    pub day_after: ForecastDay,
    pub warnings: Vec<String>,
}

impl Forecast {
    /// Blank outlook for `start` and the two following days
    pub fn starting(start: NaiveDate) -> Self {
        let next = |days: i64| start + Duration::days(days);
        Self {
            today: ForecastDay::blank(start),
            tomorrow: ForecastDay::blank(next(1)),
            day_after: ForecastDay::blank(next(2)),
            warnings: Vec::new(),
        }
    }

    pub fn days(&self) -> [&ForecastDay; 3] {
        [&self.today, &self.tomorrow, &self.day_after]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub k_index_forecast: String,
    pub solar_activity: String,
    pub hf_conditions: String,
    pub vhf_conditions: String,
    pub best_bands: Vec<String>,
    pub worst_bands: Vec<String>,
}

impl ForecastDay {
    pub fn blank(date: NaiveDate) -> Self {
        Self {
            date,
            k_index_forecast: String::new(),
            solar_activity: String::new(),
            hf_conditions: String::new(),
            vhf_conditions: String::new(),
            best_bands: Vec::new(),
            worst_bands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceWeatherEvent {
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KIndexPoint {
    pub timestamp: DateTime<Utc>,
    pub k_index: f64,
    pub estimated_kp: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarPoint {
    pub timestamp: DateTime<Utc>,
    pub flux: f64,
    pub flux_adjusted: f64,
    pub sunspot: i64,
    pub source: String,
}

/// One tagged scalar of an observation, as seen by provenance checks
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceEntry<'a> {
    pub field: &'static str,
    /// Non-zero number or non-empty string
    pub is_set: bool,
    pub source: &'a str,
}

impl PropagationObservation {
    /// Observation with no data: zero values, empty tags, blank forecast
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            solar: SolarConditions::default(),
            geomag: GeomagConditions::default(),
            bands: BTreeMap::new(),
            bands_source: String::new(),
            forecast: Forecast::starting(timestamp.date_naive()),
            events: Vec::new(),
            history_k: Vec::new(),
            history_solar: Vec::new(),
        }
    }

    /// All tagged scalars with their source tags
    pub fn provenance(&self) -> Vec<ProvenanceEntry<'_>> {
        let s = &self.solar;
        let g = &self.geomag;
        vec![
            number("solar.flux_10_7cm", s.flux_10_7cm, &s.flux_10_7cm_source),
            number("solar.flux_adjusted", s.flux_adjusted, &s.flux_adjusted_source),
            number(
                "solar.sunspot_number",
                s.sunspot_number as f64,
                &s.sunspot_number_source,
            ),
            text("solar.xray_class", &s.xray_class, &s.xray_class_source),
            number(
                "solar.solar_wind_speed_kms",
                s.solar_wind_speed_kms,
                &s.solar_wind_speed_kms_source,
            ),
            number("solar.proton_flux", s.proton_flux, &s.proton_flux_source),
            text("solar.electron_flux", &s.electron_flux, &s.electron_flux_source),
            text("solar.helium_line", &s.helium_line, &s.helium_line_source),
            text("solar.aurora_level", &s.aurora_level, &s.aurora_level_source),
            number("geomag.k_index", g.k_index, &g.k_index_source),
            number("geomag.a_index", g.a_index, &g.a_index_source),
            number(
                "geomag.magnetic_field_nt",
                g.magnetic_field_nt,
                &g.magnetic_field_nt_source,
            ),
            text("geomag.lat_degree", &g.lat_degree, &g.lat_degree_source),
            ProvenanceEntry {
                field: "bands",
                is_set: !self.bands.is_empty(),
                source: self.bands_source.as_str(),
            },
        ]
    }
}

fn number<'a>(field: &'static str, value: f64, source: &'a str) -> ProvenanceEntry<'a> {
    ProvenanceEntry {
        field,
        is_set: value != 0.0,
        source,
    }
}

fn text<'a>(field: &'static str, value: &str, source: &'a str) -> ProvenanceEntry<'a> {
    ProvenanceEntry {
        field,
        is_set: !value.trim().is_empty(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_band_hour_boundaries() {
        let band = BandConditions {
            day_condition: Condition::Good,
            night_condition: Condition::Poor,
        };
        assert_eq!(band.at_hour(5), Condition::Poor);
        assert_eq!(band.at_hour(6), Condition::Good);
        assert_eq!(band.at_hour(17), Condition::Good);
        assert_eq!(band.at_hour(18), Condition::Poor);
        assert_eq!(band.at_hour(0), Condition::Poor);
    }

    #[test]
    fn test_forecast_days_are_consecutive() {
        let start = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let forecast = Forecast::starting(start);
        assert_eq!(forecast.today.date, start);
        assert_eq!(forecast.tomorrow.date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(forecast.day_after.date, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }

    #[test]
    fn test_empty_observation_has_no_set_fields() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 17, 14, 30, 45).unwrap();
        let observation = PropagationObservation::empty(ts);
        assert!(observation.provenance().iter().all(|entry| !entry.is_set));
    }

    #[test]
    fn test_event_type_serializes_as_type() {
        let event = SpaceWeatherEvent {
            source: "SIDC".to_string(),
            event_type: "Monthly Sunspot Number".to_string(),
            severity: String::new(),
            description: "X1.5 flare".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 9, 17, 0, 0, 0).unwrap(),
            impact: String::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Monthly Sunspot Number");
        assert!(json.get("event_type").is_none());
    }
}
