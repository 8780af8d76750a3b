//! Synthetic trip generator
//!
//! Stands in for the live transit data collector: produces journey records
//! around a city centre for every day of a date range, in the same JSON shape
//! the pipeline reads.

use crate::domain::trip::{RawTripRecord, Stop};
use crate::domain::types::{Coordinate, TransportMode};
use crate::error::{EmissionError, Result};
use crate::services::estimator::EmissionEstimator;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Departure hours used for simulated journeys
const DEPARTURE_HOURS: [u32; 3] = [8, 12, 18];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_users")]
    pub users: Vec<String>,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_journeys_per_day")]
    pub journeys_per_day: u32,
    #[serde(default = "default_center_latitude")]
    pub center_latitude: f64,
    #[serde(default = "default_center_longitude")]
    pub center_longitude: f64,
    /// Half-width of the box around the centre, in degrees
    #[serde(default = "default_spread_degrees")]
    pub spread_degrees: f64,
    #[serde(default = "default_starting_address")]
    pub starting_address: String,
    #[serde(default = "default_destination_address")]
    pub destination_address: String,
}

fn default_users() -> Vec<String> {
    vec!["user_1".to_string(), "user_2".to_string(), "user_3".to_string()]
}

fn default_days() -> u32 {
    60
}

fn default_journeys_per_day() -> u32 {
    3
}

fn default_center_latitude() -> f64 {
    52.5
}

fn default_center_longitude() -> f64 {
    13.4
}

fn default_spread_degrees() -> f64 {
    0.1
}

fn default_starting_address() -> String {
    "Brandenburg Gate".to_string()
}

fn default_destination_address() -> String {
    "East Side Gallery".to_string()
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            users: default_users(),
            days: default_days(),
            journeys_per_day: default_journeys_per_day(),
            center_latitude: default_center_latitude(),
            center_longitude: default_center_longitude(),
            spread_degrees: default_spread_degrees(),
            starting_address: default_starting_address(),
            destination_address: default_destination_address(),
        }
    }
}

pub struct TripSimulator {
    settings: SimulationSettings,
    estimator: EmissionEstimator,
    rng: StdRng,
}

impl TripSimulator {
    pub fn new(settings: SimulationSettings, estimator: EmissionEstimator, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { settings, estimator, rng }
    }

    /// `journeys_per_day` records for each day of `start..=end`
    pub fn generate(&mut self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawTripRecord>> {
        let mut records = Vec::new();
        let mut date = start;
        while date <= end {
            for _ in 0..self.settings.journeys_per_day {
                records.push(self.journey_on(date)?);
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(records)
    }

    /// Records for the configured number of days ending at `today`
    pub fn generate_until(&mut self, today: NaiveDate) -> Result<Vec<RawTripRecord>> {
        let start = today.checked_sub_signed(Duration::days(i64::from(self.settings.days))).ok_or_else(|| {
            EmissionError::DateOutOfRange(format!("{} days before {}", self.settings.days, today))
        })?;
        self.generate(start, today)
    }

    fn journey_on(&mut self, date: NaiveDate) -> Result<RawTripRecord> {
        let hour = *DEPARTURE_HOURS.choose(&mut self.rng).unwrap_or(&DEPARTURE_HOURS[0]);
        let minute: u32 = self.rng.gen_range(0..60);
        let mode = TransportMode::KNOWN
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or(TransportMode::Train);
        let user_id = self.settings.users.choose(&mut self.rng).cloned();

        let from = self.random_location()?;
        let to = self.random_location()?;
        let (_, emission_kg) = self.estimator.estimate(from, to, &mode)?;

        Ok(RawTripRecord {
            user_id,
            starting_address: Some(self.settings.starting_address.clone()),
            destination_address: Some(self.settings.destination_address.clone()),
            date_time: Some(format!("{}T{:02}:{:02}:00Z", date.format("%Y-%m-%d"), hour, minute)),
            transport_mode: Some(mode.to_string()),
            from_stops: vec![Stop::at(from)],
            to_stops: vec![Stop::at(to)],
            emission_kg: Some(emission_kg),
        })
    }

    fn random_location(&mut self) -> Result<Coordinate> {
        let spread = self.settings.spread_degrees.abs();
        let lat = self.settings.center_latitude + self.offset(spread);
        let lon = self.settings.center_longitude + self.offset(spread);
        Coordinate::new(round6(lat), round6(lon))
    }

    fn offset(&mut self, spread: f64) -> f64 {
        if spread == 0.0 {
            0.0
        } else {
            self.rng.gen_range(-spread..=spread)
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
