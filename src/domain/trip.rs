//! Trip records: the raw journey JSON and its canonical form

use crate::domain::types::{Coordinate, TransportMode, UserId};
use crate::error::{EmissionError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Location of a stop as found in the journey JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopLocation {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<StopLocation>,
}

impl Stop {
    pub fn at(coord: Coordinate) -> Self {
        Self {
            id: None,
            name: None,
            location: Some(StopLocation {
                latitude: Some(coord.latitude),
                longitude: Some(coord.longitude),
            }),
        }
    }
}

/// Raw journey record as written by the data collector
///
/// Every field is optional at the decode stage; the normalizer decides
/// which absences are fatal for the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTripRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "startingAddress", default, skip_serializing_if = "Option::is_none")]
    pub starting_address: Option<String>,
    #[serde(rename = "destinationAddress", default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(rename = "transportMode", default, skip_serializing_if = "Option::is_none")]
    pub transport_mode: Option<String>,
    #[serde(rename = "fromStops", default)]
    pub from_stops: Vec<Stop>,
    #[serde(rename = "toStops", default)]
    pub to_stops: Vec<Stop>,
    /// Precomputed by the collector; never used for computation, so a
    /// non-numeric value reads as absent
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub emission_kg: Option<f64>,
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(serde_json::Value::deserialize(deserializer)?.as_f64())
}

impl RawTripRecord {
    /// Decode one record from a JSON value
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| EmissionError::MalformedRecord(e.to_string()))
    }

    /// Origin coordinate (first entry of `fromStops`), unvalidated
    pub fn origin(&self) -> Result<Coordinate> {
        first_stop_coordinate(&self.from_stops, "fromStops")
    }

    /// Destination coordinate (first entry of `toStops`), unvalidated
    pub fn destination(&self) -> Result<Coordinate> {
        first_stop_coordinate(&self.to_stops, "toStops")
    }
}

fn first_stop_coordinate(stops: &[Stop], field: &str) -> Result<Coordinate> {
    let location = stops
        .first()
        .and_then(|stop| stop.location.as_ref())
        .ok_or_else(|| EmissionError::MalformedRecord(format!("missing {}[0].location", field)))?;

    match (location.latitude, location.longitude) {
        (Some(latitude), Some(longitude)) => Ok(Coordinate { latitude, longitude }),
        _ => Err(EmissionError::MalformedRecord(format!(
            "missing latitude/longitude in {}[0].location",
            field
        ))),
    }
}

/// Canonical trip derived from one raw record; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTrip {
    pub timestamp: DateTime<Utc>,
    pub mode: TransportMode,
    pub user_id: UserId,
    pub distance_km: f64,
    pub emission_kg: f64,
}

impl CanonicalTrip {
    /// UTC calendar date of the trip
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_record() {
        let value = json!({
            "user_id": "user_2",
            "startingAddress": "Brandenburg Gate",
            "destinationAddress": "East Side Gallery",
            "dateTime": "2024-03-01T08:15:00Z",
            "transportMode": "bus",
            "fromStops": [{"location": {"latitude": 52.5163, "longitude": 13.3777}}],
            "toStops": [{"location": {"latitude": 52.5050, "longitude": 13.4397}}],
            "emission_kg": 0.35
        });

        let raw = RawTripRecord::from_value(&value).unwrap();
        assert_eq!(raw.user_id.as_deref(), Some("user_2"));
        assert_eq!(raw.transport_mode.as_deref(), Some("bus"));
        assert_eq!(raw.origin().unwrap().latitude, 52.5163);
        assert_eq!(raw.destination().unwrap().longitude, 13.4397);
    }

    #[test]
    fn test_decode_wrong_type_is_malformed() {
        let value = json!({"dateTime": 12345});
        assert!(matches!(
            RawTripRecord::from_value(&value),
            Err(EmissionError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_non_numeric_precomputed_emission_is_ignored() {
        for emission in [json!("n/a"), json!(null), json!({"kg": 1.0})] {
            let raw = RawTripRecord::from_value(&json!({
                "dateTime": "2024-03-01T08:15:00Z",
                "emission_kg": emission,
                "fromStops": [{"location": {"latitude": 52.5, "longitude": 13.4}}],
                "toStops": [{"location": {"latitude": 52.6, "longitude": 13.4}}]
            }))
            .unwrap();
            assert!(raw.emission_kg.is_none());
            assert!(raw.origin().is_ok());
        }

        let raw = RawTripRecord::from_value(&json!({"emission_kg": 0.35})).unwrap();
        assert_eq!(raw.emission_kg, Some(0.35));
    }

    #[test]
    fn test_missing_stops_is_malformed() {
        let raw = RawTripRecord::from_value(&json!({"dateTime": "2024-03-01T08:15:00Z"})).unwrap();
        assert!(matches!(raw.origin(), Err(EmissionError::MalformedRecord(_))));

        let raw = RawTripRecord::from_value(&json!({
            "fromStops": [{"location": {"latitude": 52.5}}]
        }))
        .unwrap();
        assert!(matches!(raw.origin(), Err(EmissionError::MalformedRecord(_))));
    }
}
