//! Shared types for the emission pipeline

use crate::error::{EmissionError, Result};
use serde::{Deserialize, Serialize};

/// Transport mode of a trip
///
/// Unrecognised modes are kept verbatim in `Other` so they still show up in
/// mode summaries; they are priced with the fallback emission factor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportMode {
    Train,
    Bus,
    Subway,
    Tram,
    Other(String),
}

impl TransportMode {
    /// The four modes with a dedicated emission factor
    pub const KNOWN: [TransportMode; 4] =
        [TransportMode::Train, TransportMode::Bus, TransportMode::Subway, TransportMode::Tram];

    pub fn as_str(&self) -> &str {
        match self {
            TransportMode::Train => "train",
            TransportMode::Bus => "bus",
            TransportMode::Subway => "subway",
            TransportMode::Tram => "tram",
            TransportMode::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TransportMode::Other(_))
    }
}

impl std::str::FromStr for TransportMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Ok(match s.as_str() {
            "train" => TransportMode::Train,
            "bus" => TransportMode::Bus,
            "subway" => TransportMode::Subway,
            "tram" => TransportMode::Tram,
            _ => TransportMode::Other(s),
        })
    }
}

impl From<String> for TransportMode {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(mode) => mode,
            Err(never) => match never {},
        }
    }
}

impl From<TransportMode> for String {
    fn from(mode: TransportMode) -> Self {
        mode.as_str().to_string()
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Newtype wrapper for user identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a validated coordinate
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self { latitude, longitude };
        coord.validate()?;
        Ok(coord)
    }

    /// Latitude must lie in -90..=90 and longitude in -180..=180
    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(EmissionError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Outlier label of a daily aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierLabel {
    Normal,
    Anomalous,
}

impl OutlierLabel {
    pub fn from_flag(is_anomalous: bool) -> Self {
        if is_anomalous {
            OutlierLabel::Anomalous
        } else {
            OutlierLabel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierLabel::Normal => "normal",
            OutlierLabel::Anomalous => "anomalous",
        }
    }
}
