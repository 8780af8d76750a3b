//! Transit emissions library
//!
//! Estimates CO2 for transit trips, aggregates it per day, mode and user,
//! forecasts the next days and flags anomalous days.

pub mod domain;
pub mod error;
pub mod infra;
pub mod io;
pub mod services;

pub use error::{EmissionError, Result};
