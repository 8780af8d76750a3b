//! Trend estimation over the daily emission series
//!
//! `TrendEstimator` is the seam for the forecasting capability. The default
//! `AdditiveTrendModel` fits `y(t) = intercept + slope * t + weekly(t)` by
//! least squares, where `weekly` is a Fourier series with a 7-day period.
//! The uncertainty band comes from the residual spread of the fit.

use crate::domain::aggregate::{DailyAggregate, Forecast, ForecastPoint};
use crate::error::{EmissionError, Result};
use chrono::{Datelike, Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::f64::consts::PI;
use tracing::debug;

/// Weekly seasonality needs at least this many days between first and last observation
const MIN_SEASONAL_SPAN_DAYS: i64 = 14;
/// Singular values below this are treated as zero in the least-squares solve
const SVD_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastSettings {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_weekly_seasonality")]
    pub weekly_seasonality: bool,
    #[serde(default = "default_fourier_order")]
    pub fourier_order: usize,
    /// Width of the uncertainty interval, in (0, 1)
    #[serde(default = "default_interval_width")]
    pub interval_width: f64,
}

fn default_horizon_days() -> u32 {
    7
}

fn default_weekly_seasonality() -> bool {
    true
}

fn default_fourier_order() -> usize {
    3
}

fn default_interval_width() -> f64 {
    0.8
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            weekly_seasonality: default_weekly_seasonality(),
            fourier_order: default_fourier_order(),
            interval_width: default_interval_width(),
        }
    }
}

/// Forecasting capability: fit on an observed daily series, project forward
pub trait TrendEstimator {
    fn name(&self) -> &'static str;

    /// Fit on `series` (dates ascending) and project `horizon_days` days past its last date
    fn fit_predict(&self, series: &[DailyAggregate], horizon_days: u32) -> Result<Forecast>;
}

/// Forecast `horizon_days` days after the last observed date.
///
/// Fails with `InsufficientHistory` when the series has fewer distinct dates
/// than `min_history_days` (never less than 2).
pub fn forecast(
    estimator: &dyn TrendEstimator,
    series: &[DailyAggregate],
    horizon_days: u32,
    min_history_days: usize,
) -> Result<Forecast> {
    let observed = series.iter().map(|d| d.date).collect::<BTreeSet<_>>().len();
    let required = min_history_days.max(2);
    if observed < required {
        return Err(EmissionError::InsufficientHistory { observed, required });
    }
    estimator.fit_predict(series, horizon_days)
}

/// Linear trend plus weekly Fourier seasonality, fit by least squares
#[derive(Debug, Clone, Default)]
pub struct AdditiveTrendModel {
    settings: ForecastSettings,
}

impl AdditiveTrendModel {
    pub fn new(settings: ForecastSettings) -> Self {
        Self { settings }
    }
}

/// Design matrix layout for one fit
struct Design {
    origin: NaiveDate,
    span_days: f64,
    fourier_order: usize,
}

impl Design {
    fn columns(&self) -> usize {
        2 + 2 * self.fourier_order
    }

    fn row(&self, date: NaiveDate) -> Vec<f64> {
        let t = (date - self.origin).num_days() as f64 / self.span_days;
        let mut row = Vec::with_capacity(self.columns());
        row.push(1.0);
        row.push(t);
        // Absolute day number keeps the weekly phase tied to the calendar
        let day = f64::from(date.num_days_from_ce());
        for k in 1..=self.fourier_order {
            let angle = 2.0 * PI * k as f64 * day / 7.0;
            row.push(angle.sin());
            row.push(angle.cos());
        }
        row
    }
}

impl TrendEstimator for AdditiveTrendModel {
    fn name(&self) -> &'static str {
        "additive_trend"
    }

    fn fit_predict(&self, series: &[DailyAggregate], horizon_days: u32) -> Result<Forecast> {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Err(EmissionError::ForecastFailed("empty series".to_string()));
        };
        if !(self.settings.interval_width > 0.0 && self.settings.interval_width < 1.0) {
            return Err(EmissionError::ForecastFailed(format!(
                "interval_width must be in (0, 1), got {}",
                self.settings.interval_width
            )));
        }

        let n = series.len();
        let span = (last.date - first.date).num_days();
        let mut design = Design { origin: first.date, span_days: span.max(1) as f64, fourier_order: 0 };
        let seasonal_columns = 2 + 2 * self.settings.fourier_order;
        if self.settings.weekly_seasonality
            && self.settings.fourier_order > 0
            && span >= MIN_SEASONAL_SPAN_DAYS
            && n > seasonal_columns
        {
            design.fourier_order = self.settings.fourier_order;
        }
        let p = design.columns();

        let rows: Vec<Vec<f64>> = series.iter().map(|d| design.row(d.date)).collect();
        let x = DMatrix::from_fn(n, p, |i, j| rows[i][j]);
        let y = DVector::from_iterator(n, series.iter().map(|d| d.emission_kg));

        let beta = x
            .clone()
            .svd(true, true)
            .solve(&y, SVD_EPS)
            .map_err(|e| EmissionError::ForecastFailed(e.to_string()))?;

        let fitted_values = &x * &beta;
        let residual_ss: f64 = (&y - &fitted_values).iter().map(|r| r * r).sum();
        let dof = n.saturating_sub(p).max(1) as f64;
        let sigma = (residual_ss / dof).sqrt();
        let half_width = normal_quantile(0.5 + self.settings.interval_width / 2.0) * sigma;

        debug!(
            observations = %n,
            columns = %p,
            seasonal = %(design.fourier_order > 0),
            sigma = format!("{:.4}", sigma),
            "trend_model_fitted"
        );

        let point = |date: NaiveDate, predicted_kg: f64| ForecastPoint {
            date,
            predicted_kg,
            lower_kg: predicted_kg - half_width,
            upper_kg: predicted_kg + half_width,
        };

        let fitted =
            series.iter().zip(fitted_values.iter()).map(|(day, &value)| point(day.date, value)).collect();

        let projected = (1..=i64::from(horizon_days))
            .map(|h| {
                let date = last.date.checked_add_signed(Duration::days(h)).ok_or_else(|| {
                    EmissionError::ForecastFailed(format!(
                        "horizon of {} days runs past the last representable date",
                        horizon_days
                    ))
                })?;
                let row = DVector::from_vec(design.row(date));
                Ok(point(date, row.dot(&beta)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Forecast { model: self.name().to_string(), fitted, projected })
    }
}

/// Inverse CDF of the standard normal distribution (Acklam's approximation,
/// relative error below 1.2e-9). `p` must be in (0, 1).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
