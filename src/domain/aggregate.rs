//! Aggregated views over canonical trips

use crate::domain::types::{OutlierLabel, TransportMode, UserId};
use chrono::NaiveDate;
use serde::Serialize;

/// Emission total for one UTC calendar date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub emission_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<OutlierLabel>,
    /// Only set for projected dates beyond the observed range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_kg: Option<f64>,
}

impl DailyAggregate {
    pub fn new(date: NaiveDate, emission_kg: f64) -> Self {
        Self { date, emission_kg, label: None, forecast_kg: None }
    }

    /// A future date carrying only a forecast; observed emission is zero
    pub fn projected(date: NaiveDate, forecast_kg: f64) -> Self {
        Self { date, emission_kg: 0.0, label: None, forecast_kg: Some(forecast_kg) }
    }

    pub fn is_anomalous(&self) -> bool {
        self.label == Some(OutlierLabel::Anomalous)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeSummary {
    pub mode: TransportMode,
    pub emission_kg: f64,
    pub trips: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub emission_kg: f64,
    pub trips: usize,
}

/// One cell of the stacked daily-by-mode breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayModeTotal {
    pub date: NaiveDate,
    pub mode: TransportMode,
    pub emission_kg: f64,
}

/// One point of a forecast, with its uncertainty band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_kg: f64,
    pub lower_kg: f64,
    pub upper_kg: f64,
}

/// Forecast output: in-sample fit plus the projected horizon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub model: String,
    pub fitted: Vec<ForecastPoint>,
    pub projected: Vec<ForecastPoint>,
}

impl Forecast {
    /// Projected days as daily aggregates
    pub fn projected_days(&self) -> Vec<DailyAggregate> {
        self.projected.iter().map(|p| DailyAggregate::projected(p.date, p.predicted_kg)).collect()
    }

    pub fn projected_total(&self) -> f64 {
        self.projected.iter().map(|p| p.predicted_kg).sum()
    }
}

/// Outlier verdict for one daily aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyPoint {
    pub date: NaiveDate,
    pub emission_kg: f64,
    pub is_anomalous: bool,
}
