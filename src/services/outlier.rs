//! Outlier detection over the daily emission series
//!
//! `OutlierDetector` is the seam for the detection capability. The default
//! `IsolationForest` isolates points with random axis splits: a value that is
//! separated from the rest after few splits gets a high anomaly score. Points
//! scoring strictly above the `(1 - contamination)` quantile are anomalous.

use crate::domain::aggregate::{AnomalyPoint, DailyAggregate};
use crate::error::{EmissionError, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnomalySettings {
    /// Expected share of anomalous days, in (0, 0.5]
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// Sub-sample size per tree (capped at the series length)
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_contamination() -> f64 {
    0.1
}

fn default_n_trees() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_seed() -> u64 {
    42
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            n_trees: default_n_trees(),
            max_samples: default_max_samples(),
            seed: default_seed(),
        }
    }
}

/// Outlier detection capability over a one-dimensional series
pub trait OutlierDetector {
    fn name(&self) -> &'static str;

    /// One flag per input value, `true` for anomalous
    fn fit_predict(&self, values: &[f64]) -> Result<Vec<bool>>;
}

/// Label each daily aggregate; output order matches input order
pub fn detect_anomalies(detector: &dyn OutlierDetector, series: &[DailyAggregate]) -> Result<Vec<AnomalyPoint>> {
    let values: Vec<f64> = series.iter().map(|d| d.emission_kg).collect();
    let flags = detector.fit_predict(&values)?;
    if flags.len() != values.len() {
        return Err(EmissionError::OutlierDetectionFailed(format!(
            "{} returned {} labels for {} values",
            detector.name(),
            flags.len(),
            values.len()
        )));
    }

    Ok(series
        .iter()
        .zip(flags)
        .map(|(day, is_anomalous)| AnomalyPoint { date: day.date, emission_kg: day.emission_kg, is_anomalous })
        .collect())
}

enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: Box<Node>, right: Box<Node> },
}

struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(sample: &[f64], height_limit: usize, rng: &mut StdRng) -> Self {
        Self { root: grow(sample, 0, height_limit, rng) }
    }

    fn path_length(&self, value: f64) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split { threshold, left, right } => {
                    node = if value < *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn grow(sample: &[f64], depth: usize, height_limit: usize, rng: &mut StdRng) -> Node {
    if depth >= height_limit || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    let (min, max) = sample
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    // Identical values cannot be split further
    if max <= min {
        return Node::Leaf { size: sample.len() };
    }

    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) = sample.iter().partition(|&&v| v < threshold);

    Node::Split {
        threshold,
        left: Box::new(grow(&left, depth + 1, height_limit, rng)),
        right: Box::new(grow(&right, depth + 1, height_limit, rng)),
    }
}

/// Average path length of an unsuccessful binary search tree lookup over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile of unsorted values, `q` in [0, 1]
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Seeded isolation forest
#[derive(Debug, Clone, Default)]
pub struct IsolationForest {
    settings: AnomalySettings,
}

impl IsolationForest {
    pub fn new(settings: AnomalySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnomalySettings {
        &self.settings
    }

    /// Anomaly score per value in (0, 1]; higher is more anomalous
    pub fn scores(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(EmissionError::OutlierDetectionFailed(format!("non-finite value {}", bad)));
        }
        if self.settings.n_trees == 0 {
            return Err(EmissionError::OutlierDetectionFailed("n_trees must be positive".to_string()));
        }

        let n = values.len();
        let sample_size = self.settings.max_samples.clamp(1, n);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let normalizer = average_path_length(sample_size);
        if normalizer <= 0.0 {
            // A single-point sample cannot be isolated
            return Ok(vec![0.5; n]);
        }

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let trees: Vec<IsolationTree> = (0..self.settings.n_trees)
            .map(|_| {
                let sample: Vec<f64> = index::sample(&mut rng, n, sample_size).iter().map(|i| values[i]).collect();
                IsolationTree::build(&sample, height_limit, &mut rng)
            })
            .collect();

        Ok(values
            .iter()
            .map(|&v| {
                let mean_path = trees.iter().map(|t| t.path_length(v)).sum::<f64>() / trees.len() as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect())
    }
}

impl OutlierDetector for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn fit_predict(&self, values: &[f64]) -> Result<Vec<bool>> {
        let contamination = self.settings.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(EmissionError::OutlierDetectionFailed(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }

        let scores = self.scores(values)?;
        if scores.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = quantile(&scores, 1.0 - contamination);
        let flags: Vec<bool> = scores.iter().map(|&s| s > threshold).collect();

        debug!(
            values = %values.len(),
            threshold = format!("{:.4}", threshold),
            flagged = %flags.iter().filter(|&&f| f).count(),
            "isolation_forest_scored"
        );
        Ok(flags)
    }
}
