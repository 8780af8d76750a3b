//! Domain models - core business types
//!
//! This module contains the canonical data types used throughout the system:
//! - `RawTripRecord` - journey record as found in the input file
//! - `CanonicalTrip` - normalized trip with its estimated emission
//! - `DailyAggregate`, `ModeSummary`, `UserSummary` - aggregated views
//! - `Forecast`, `AnomalyPoint` - trend and outlier outputs

pub mod aggregate;
pub mod trip;
pub mod types;

pub use aggregate::{
    AnomalyPoint, DailyAggregate, DayModeTotal, Forecast, ForecastPoint, ModeSummary, UserSummary,
};
pub use trip::{CanonicalTrip, RawTripRecord, Stop, StopLocation};
pub use types::{Coordinate, OutlierLabel, TransportMode, UserId};
