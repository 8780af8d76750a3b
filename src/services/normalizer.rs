//! Record normalizer: raw journey JSON -> canonical trips
//!
//! A batch run is skip-and-log: each rejected record is logged and kept
//! with its reason. Only a batch with no valid record fails
//! (`EmptyInput`).

use crate::domain::trip::{CanonicalTrip, RawTripRecord};
use crate::domain::types::{TransportMode, UserId};
use crate::error::{EmissionError, Result};
use crate::services::estimator::EmissionEstimator;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Mode assumed when a record has no `transportMode`
pub const DEFAULT_MODE: TransportMode = TransportMode::Train;
/// User id assumed when a record has no `user_id`
pub const UNKNOWN_USER: &str = "unknown";

/// A record that failed normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Position in the input file
    pub index: usize,
    pub reason: String,
}

/// Result of normalizing a whole input file
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub trips: Vec<CanonicalTrip>,
    pub rejected: Vec<RejectedRecord>,
}

/// ISO-8601 layouts carrying a UTC offset (`Z` is rewritten to `+00:00`)
const OFFSET_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

/// ISO-8601 layouts without an offset, read as UTC
const NAIVE_FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Parse an ISO-8601 timestamp into a UTC instant.
///
/// Accepts second or minute precision, `Z`, extended (`+02:00`) or basic
/// (`+0200`) offsets, and a bare date (midnight). A timestamp without any
/// offset is read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let with_offset = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(local) => format!("{}+00:00", local),
        None => s.to_string(),
    };
    if let Some(dt) = OFFSET_FORMATS.iter().find_map(|fmt| DateTime::parse_from_str(&with_offset, fmt).ok()) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS.iter().find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok()) {
        return Ok(naive.and_utc());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| EmissionError::MalformedRecord(format!("unparseable dateTime {:?}: {}", s, e)))
}

pub struct Normalizer {
    estimator: EmissionEstimator,
}

impl Normalizer {
    pub fn new(estimator: EmissionEstimator) -> Self {
        Self { estimator }
    }

    /// Normalize a single decoded record
    pub fn normalize(&self, raw: &RawTripRecord) -> Result<CanonicalTrip> {
        let date_time = raw
            .date_time
            .as_deref()
            .ok_or_else(|| EmissionError::MalformedRecord("missing dateTime".to_string()))?;
        let timestamp = parse_timestamp(date_time)?;

        let mode = match raw.transport_mode.as_deref() {
            None => DEFAULT_MODE,
            Some(s) if s.trim().is_empty() => {
                return Err(EmissionError::MalformedRecord("empty transportMode".to_string()));
            }
            Some(s) => TransportMode::from(s.to_string()),
        };

        let user_id = UserId(raw.user_id.clone().unwrap_or_else(|| UNKNOWN_USER.to_string()));

        let origin = raw.origin()?;
        let destination = raw.destination()?;
        let (distance_km, emission_kg) = self.estimator.estimate(origin, destination, &mode)?;

        if self.estimator.factors().uses_fallback(&mode) {
            debug!(mode = %mode, "transport_mode_uses_fallback_factor");
        }

        Ok(CanonicalTrip { timestamp, mode, user_id, distance_km, emission_kg })
    }

    /// Decode and normalize every record, collecting rejections
    pub fn normalize_batch(&self, records: &[serde_json::Value]) -> Result<NormalizedBatch> {
        let mut batch = NormalizedBatch::default();

        for (index, value) in records.iter().enumerate() {
            match RawTripRecord::from_value(value).and_then(|raw| self.normalize(&raw)) {
                Ok(trip) => {
                    debug!(
                        index = %index,
                        user = %trip.user_id,
                        mode = %trip.mode,
                        distance_km = format!("{:.3}", trip.distance_km),
                        emission_kg = format!("{:.4}", trip.emission_kg),
                        "trip_normalized"
                    );
                    batch.trips.push(trip);
                }
                Err(e) => {
                    warn!(index = %index, error = %e, "record_rejected");
                    batch.rejected.push(RejectedRecord { index, reason: e.to_string() });
                }
            }
        }

        if batch.trips.is_empty() {
            return Err(EmissionError::EmptyInput { rejected: batch.rejected.len() });
        }

        info!(
            records = %records.len(),
            trips = %batch.trips.len(),
            rejected = %batch.rejected.len(),
            "records_normalized"
        );
        Ok(batch)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(EmissionEstimator::default())
    }
}
