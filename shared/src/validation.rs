//! Invariant checks for normalised observations
//!
//! These never reject an observation; the backend logs whatever they report.
//! Out-of-range K values in particular are passed through upstream data and
//! are flagged here rather than clamped.

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::models::PropagationObservation;

/// One broken observation invariant
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("fields without source tag: {}", .0.join(", "))]
    MissingSource(Vec<String>),

    #[error("k_index {0} outside 0-9")]
    KIndexOutOfRange(f64),

    #[error("{0} is not in timestamp order")]
    HistoryOrder(&'static str),

    #[error("forecast dates not consecutive: {0}, {1}, {2}")]
    ForecastDates(NaiveDate, NaiveDate, NaiveDate),

    #[error("bands without condition: {}", .0.join(", "))]
    IncompleteBands(Vec<String>),
}

// ============================================================================
// Individual invariants
// ============================================================================

/// Every set scalar must name its source
pub fn validate_provenance(observation: &PropagationObservation) -> Result<(), InvariantViolation> {
    let missing: Vec<String> = observation
        .provenance()
        .into_iter()
        .filter(|entry| entry.is_set && entry.source.trim().is_empty())
        .map(|entry| entry.field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(InvariantViolation::MissingSource(missing))
    }
}

/// K must lie in [0, 9] whenever it was read from a source
pub fn validate_k_index(observation: &PropagationObservation) -> Result<(), InvariantViolation> {
    let geomag = &observation.geomag;
    if geomag.k_index_source.is_empty() {
        return Ok(());
    }
    if !(0.0..=9.0).contains(&geomag.k_index) {
        return Err(InvariantViolation::KIndexOutOfRange(geomag.k_index));
    }
    Ok(())
}

/// Both history series must be in non-decreasing timestamp order
pub fn validate_history_order(observation: &PropagationObservation) -> Result<(), InvariantViolation> {
    let k_sorted = observation
        .history_k
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp);
    if !k_sorted {
        return Err(InvariantViolation::HistoryOrder("history_k"));
    }

    let solar_sorted = observation
        .history_solar
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp);
    if !solar_sorted {
        return Err(InvariantViolation::HistoryOrder("history_solar"));
    }

    Ok(())
}

/// Forecast days must be consecutive calendar days
pub fn validate_forecast_days(observation: &PropagationObservation) -> Result<(), InvariantViolation> {
    let forecast = &observation.forecast;
    let one_day = Duration::days(1);
    if forecast.tomorrow.date - forecast.today.date != one_day
        || forecast.day_after.date - forecast.tomorrow.date != one_day
    {
        return Err(InvariantViolation::ForecastDates(
            forecast.today.date,
            forecast.tomorrow.date,
            forecast.day_after.date,
        ));
    }
    Ok(())
}

/// Every band present must carry two known conditions
pub fn validate_bands(observation: &PropagationObservation) -> Result<(), InvariantViolation> {
    let incomplete: Vec<String> = observation
        .bands
        .iter()
        .filter(|(_, band)| !band.day_condition.is_known() || !band.night_condition.is_known())
        .map(|(name, _)| name.clone())
        .collect();

    if incomplete.is_empty() {
        Ok(())
    } else {
        Err(InvariantViolation::IncompleteBands(incomplete))
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Run every check and collect the violations
pub fn audit_observation(observation: &PropagationObservation) -> Vec<InvariantViolation> {
    [
        validate_provenance(observation),
        validate_k_index(observation),
        validate_history_order(observation),
        validate_forecast_days(observation),
        validate_bands(observation),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}
