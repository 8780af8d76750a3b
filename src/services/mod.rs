//! Services - business logic
//!
//! This module contains the emission pipeline stages:
//! - `estimator` - Geodesic distance and per-mode emission factors
//! - `normalizer` - Raw journey record to canonical trip (skip-and-log)
//! - `aggregator` - Daily, mode, user and top-K aggregation
//! - `trend` - Forecasting capability and the additive trend model
//! - `outlier` - Outlier detection capability and the isolation forest
//! - `summary` - Headline figures of a run
//! - `pipeline` - Orchestrates one run end to end
//! - `simulator` - Synthetic journey generator

pub mod aggregator;
pub mod estimator;
pub mod normalizer;
pub mod outlier;
pub mod pipeline;
pub mod simulator;
pub mod summary;
pub mod trend;

// Re-export commonly used types
pub use aggregator::TripFilter;
pub use estimator::{EmissionEstimator, EmissionFactors};
pub use normalizer::Normalizer;
pub use outlier::{IsolationForest, OutlierDetector};
pub use pipeline::{EmissionPipeline, EmissionReport};
pub use simulator::TripSimulator;
pub use trend::{AdditiveTrendModel, TrendEstimator};
