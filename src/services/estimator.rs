//! Distance and emission estimation
//!
//! Distance is the geodesic distance on the WGS-84 ellipsoid, solved with
//! Karney's algorithm from the `geo` crate. It converges for every pair of
//! points, antipodal ones included.

use crate::domain::types::{Coordinate, TransportMode};
use crate::error::Result;
use geo::{Distance, Geodesic, Point};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Per-kilometre emission factors (kg CO2 / km) by transport mode
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmissionFactors {
    #[serde(default = "default_train_factor")]
    pub train: f64,
    #[serde(default = "default_bus_factor")]
    pub bus: f64,
    #[serde(default = "default_subway_factor")]
    pub subway: f64,
    #[serde(default = "default_tram_factor")]
    pub tram: f64,
    /// Factor for any mode without its own entry
    #[serde(default = "default_fallback_factor")]
    pub fallback_factor: f64,
    /// Factors for additional modes, keyed by lowercase mode name
    #[serde(default, deserialize_with = "lowercase_keys")]
    pub other: HashMap<String, f64>,
}

/// Mode names are matched lowercased, so keys are stored that way
fn lowercase_keys<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, f64>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(mode, factor)| (mode.trim().to_ascii_lowercase(), factor)).collect())
}

fn default_train_factor() -> f64 {
    0.05
}

fn default_bus_factor() -> f64 {
    0.08
}

fn default_subway_factor() -> f64 {
    0.06
}

fn default_tram_factor() -> f64 {
    0.04
}

fn default_fallback_factor() -> f64 {
    0.06
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self {
            train: default_train_factor(),
            bus: default_bus_factor(),
            subway: default_subway_factor(),
            tram: default_tram_factor(),
            fallback_factor: default_fallback_factor(),
            other: HashMap::new(),
        }
    }
}

impl EmissionFactors {
    /// Factor for a mode. Modes with no entry use `fallback_factor`.
    pub fn factor_for(&self, mode: &TransportMode) -> f64 {
        match mode {
            TransportMode::Train => self.train,
            TransportMode::Bus => self.bus,
            TransportMode::Subway => self.subway,
            TransportMode::Tram => self.tram,
            TransportMode::Other(name) => {
                self.other.get(name.as_str()).copied().unwrap_or(self.fallback_factor)
            }
        }
    }

    /// True when the mode has no factor of its own
    pub fn uses_fallback(&self, mode: &TransportMode) -> bool {
        match mode {
            TransportMode::Other(name) => !self.other.contains_key(name.as_str()),
            _ => false,
        }
    }

    /// Name and value of the first negative or non-finite factor, if any
    pub fn find_invalid(&self) -> Option<(String, f64)> {
        let named = [
            ("train", self.train),
            ("bus", self.bus),
            ("subway", self.subway),
            ("tram", self.tram),
            ("fallback_factor", self.fallback_factor),
        ];
        named
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .chain(self.other.iter().map(|(name, value)| (name.clone(), *value)))
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
    }
}

/// Geodesic distance in km on the WGS-84 ellipsoid (Karney's algorithm)
pub fn geodesic_distance_km(from: Coordinate, to: Coordinate) -> f64 {
    let origin = Point::new(from.longitude, from.latitude);
    let destination = Point::new(to.longitude, to.latitude);
    Geodesic::distance(origin, destination) / 1000.0
}

/// Turns trip endpoints and a mode into kilograms of CO2
#[derive(Debug, Clone, Default)]
pub struct EmissionEstimator {
    factors: EmissionFactors,
}

impl EmissionEstimator {
    pub fn new(factors: EmissionFactors) -> Self {
        Self { factors }
    }

    pub fn factors(&self) -> &EmissionFactors {
        &self.factors
    }

    /// Distance (km) and emission (kg) between two points for a mode
    pub fn estimate(&self, from: Coordinate, to: Coordinate, mode: &TransportMode) -> Result<(f64, f64)> {
        from.validate()?;
        to.validate()?;
        let distance_km = geodesic_distance_km(from, to);
        Ok((distance_km, distance_km * self.factors.factor_for(mode)))
    }

    /// Emission (kg CO2) for a trip between two raw coordinate pairs
    pub fn estimate_emission(
        &self,
        origin_lat: f64,
        origin_lon: f64,
        dest_lat: f64,
        dest_lon: f64,
        mode: &TransportMode,
    ) -> Result<f64> {
        let from = Coordinate { latitude: origin_lat, longitude: origin_lon };
        let to = Coordinate { latitude: dest_lat, longitude: dest_lon };
        self.estimate(from, to, mode).map(|(_, kg)| kg)
    }
}

/// Emission with the default factor table
pub fn estimate_emission(
    origin_lat: f64,
    origin_lon: f64,
    dest_lat: f64,
    dest_lon: f64,
    mode: &TransportMode,
) -> Result<f64> {
    EmissionEstimator::default().estimate_emission(origin_lat, origin_lon, dest_lat, dest_lon, mode)
}
