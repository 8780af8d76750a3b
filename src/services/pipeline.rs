//! Emission pipeline: normalize -> aggregate -> {forecast, outliers} -> report
//!
//! One run owns all of its data. Forecast and outlier capabilities are
//! injected as trait objects so tests can stub them.

use crate::domain::aggregate::{
    AnomalyPoint, DailyAggregate, DayModeTotal, Forecast, ModeSummary, UserSummary,
};
use crate::domain::types::OutlierLabel;
use crate::error::{EmissionError, Result};
use crate::infra::config::Config;
use crate::services::aggregator::{
    aggregate_by_day, aggregate_by_day_and_mode, aggregate_by_mode, aggregate_by_user, filter_trips,
    recent_total, top_k, total_emission, zero_fill, TripFilter,
};
use crate::services::estimator::EmissionEstimator;
use crate::services::normalizer::{Normalizer, RejectedRecord};
use crate::services::outlier::{detect_anomalies, IsolationForest, OutlierDetector};
use crate::services::summary::EmissionSummary;
use crate::services::trend::{forecast, AdditiveTrendModel, TrendEstimator};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Everything a presentation layer needs from one run
#[derive(Debug, Clone, Serialize)]
pub struct EmissionReport {
    pub generated_at: DateTime<Utc>,
    pub input_records: usize,
    pub rejected: Vec<RejectedRecord>,
    /// Trips that passed normalization and the filter
    pub trips: usize,
    /// Daily series used for forecasting and outlier detection, with labels
    pub daily: Vec<DailyAggregate>,
    pub by_mode: Vec<ModeSummary>,
    pub by_user: Vec<UserSummary>,
    pub by_day_and_mode: Vec<DayModeTotal>,
    pub top_days: Vec<DailyAggregate>,
    pub forecast: Option<Forecast>,
    pub anomalies: Vec<AnomalyPoint>,
    pub summary: EmissionSummary,
}

impl EmissionReport {
    /// Observed days followed by projected days
    pub fn timeline(&self) -> Vec<DailyAggregate> {
        let mut timeline = self.daily.clone();
        if let Some(forecast) = &self.forecast {
            timeline.extend(forecast.projected_days());
        }
        timeline
    }

    pub fn anomalous_days(&self) -> impl Iterator<Item = &DailyAggregate> {
        self.daily.iter().filter(|d| d.is_anomalous())
    }
}

pub struct EmissionPipeline {
    config: Config,
    normalizer: Normalizer,
    trend: Box<dyn TrendEstimator>,
    outliers: Box<dyn OutlierDetector>,
}

impl EmissionPipeline {
    pub fn new(config: Config) -> Self {
        let normalizer = Normalizer::new(EmissionEstimator::new(config.emission_factors().clone()));
        let trend = Box::new(AdditiveTrendModel::new(config.forecast().clone()));
        let outliers = Box::new(IsolationForest::new(config.anomaly().clone()));
        Self { config, normalizer, trend, outliers }
    }

    pub fn with_trend_estimator(mut self, trend: Box<dyn TrendEstimator>) -> Self {
        self.trend = trend;
        self
    }

    pub fn with_outlier_detector(mut self, outliers: Box<dyn OutlierDetector>) -> Self {
        self.outliers = outliers;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline over raw JSON records.
    ///
    /// Fails with `EmptyInput` when no record normalizes. Too little history
    /// only drops the forecast; other forecast and outlier errors propagate.
    pub fn run(&self, records: &[serde_json::Value], filter: &TripFilter) -> Result<EmissionReport> {
        let batch = self.normalizer.normalize_batch(records)?;

        let trips = if filter.is_empty() { batch.trips } else { filter_trips(&batch.trips, filter) };
        if !filter.is_empty() {
            info!(
                from = ?filter.from,
                to = ?filter.to,
                modes = ?filter.modes,
                trips = %trips.len(),
                "trips_filtered"
            );
        }

        let observed = aggregate_by_day(&trips);
        let mut daily = if self.config.zero_fill() { zero_fill(&observed) } else { observed };

        let forecast = match forecast(
            self.trend.as_ref(),
            &daily,
            self.config.horizon_days(),
            self.config.min_history_days(),
        ) {
            Ok(forecast) => Some(forecast),
            Err(EmissionError::InsufficientHistory { observed, required }) => {
                warn!(observed = %observed, required = %required, "forecast_skipped_insufficient_history");
                None
            }
            Err(e) => return Err(e),
        };

        let anomalies = detect_anomalies(self.outliers.as_ref(), &daily)?;
        for (day, point) in daily.iter_mut().zip(&anomalies) {
            day.label = Some(OutlierLabel::from_flag(point.is_anomalous));
        }
        let anomaly_days = anomalies.iter().filter(|p| p.is_anomalous).count();

        let mut summary = EmissionSummary::new(
            total_emission(&trips),
            recent_total(&daily, self.config.recent_days()),
            self.config.recent_days(),
            daily.len(),
            anomaly_days,
            self.config.offset_cost_per_kg(),
        );
        if let Some(forecast) = &forecast {
            summary = summary.with_projection(forecast.projected_total());
        }

        info!(
            trips = %trips.len(),
            days = %daily.len(),
            anomaly_days = %anomaly_days,
            trend_model = %self.trend.name(),
            outlier_model = %self.outliers.name(),
            forecast = %forecast.is_some(),
            "pipeline_completed"
        );

        Ok(EmissionReport {
            generated_at: Utc::now(),
            input_records: records.len(),
            rejected: batch.rejected,
            trips: trips.len(),
            top_days: top_k(&daily, self.config.top_k()),
            by_mode: aggregate_by_mode(&trips),
            by_user: aggregate_by_user(&trips),
            by_day_and_mode: aggregate_by_day_and_mode(&trips),
            daily,
            forecast,
            anomalies,
            summary,
        })
    }
}
