//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::services::estimator::EmissionFactors;
use crate::services::outlier::AnomalySettings;
use crate::services::simulator::SimulationSettings;
use crate::services::trend::ForecastSettings;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// JSON file with raw journey records
    #[serde(default = "default_input_file")]
    pub input_file: String,
    /// Minimum distinct observed days required to forecast
    #[serde(default = "default_min_history_days")]
    pub min_history_days: usize,
    /// Insert zero-emission days for gaps before forecasting and outlier detection
    #[serde(default)]
    pub zero_fill: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Window for the "recent emissions" figure
    #[serde(default = "default_recent_days")]
    pub recent_days: u32,
}

fn default_input_file() -> String {
    "data/data.json".to_string()
}

fn default_min_history_days() -> usize {
    2
}

fn default_top_k() -> usize {
    5
}

fn default_recent_days() -> u32 {
    7
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_file: default_input_file(),
            min_history_days: default_min_history_days(),
            zero_fill: false,
            top_k: default_top_k(),
            recent_days: default_recent_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Carbon offset price in $ per kg CO2
    #[serde(default = "default_offset_cost_per_kg")]
    pub offset_cost_per_kg: f64,
}

fn default_output_dir() -> String {
    "reports".to_string()
}

fn default_offset_cost_per_kg() -> f64 {
    0.01
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { output_dir: default_output_dir(), offset_cost_per_kg: default_offset_cost_per_kg() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub emission: EmissionFactors,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub forecast: ForecastSettings,
    #[serde(default)]
    pub anomaly: AnomalySettings,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    config_file: String,
    emission_factors: EmissionFactors,
    input_file: String,
    min_history_days: usize,
    zero_fill: bool,
    top_k: usize,
    recent_days: u32,
    forecast: ForecastSettings,
    anomaly: AnomalySettings,
    output_dir: String,
    offset_cost_per_kg: f64,
    simulation: SimulationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            config_file,
            emission_factors: toml_config.emission,
            input_file: toml_config.pipeline.input_file,
            min_history_days: toml_config.pipeline.min_history_days,
            zero_fill: toml_config.pipeline.zero_fill,
            top_k: toml_config.pipeline.top_k,
            recent_days: toml_config.pipeline.recent_days,
            forecast: toml_config.forecast,
            anomaly: toml_config.anomaly,
            output_dir: toml_config.report.output_dir,
            offset_cost_per_kg: toml_config.report.offset_cost_per_kg,
            simulation: toml_config.simulation,
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, path.display().to_string());
        config.validate().with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from a path, falling back to defaults on any error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some((mode, factor)) = self.emission_factors.find_invalid() {
            bail!("emission factor for {} must be a non-negative number, got {}", mode, factor);
        }
        let contamination = self.anomaly.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            bail!("anomaly.contamination must be in (0, 0.5], got {}", contamination);
        }
        if self.anomaly.n_trees == 0 {
            bail!("anomaly.n_trees must be positive");
        }
        let width = self.forecast.interval_width;
        if !(width > 0.0 && width < 1.0) {
            bail!("forecast.interval_width must be in (0, 1), got {}", width);
        }
        if !(self.offset_cost_per_kg >= 0.0) {
            bail!("report.offset_cost_per_kg must be non-negative, got {}", self.offset_cost_per_kg);
        }
        Ok(())
    }

    // Getters for all config fields
    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn emission_factors(&self) -> &EmissionFactors {
        &self.emission_factors
    }

    pub fn input_file(&self) -> &str {
        &self.input_file
    }

    pub fn min_history_days(&self) -> usize {
        self.min_history_days
    }

    pub fn zero_fill(&self) -> bool {
        self.zero_fill
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn recent_days(&self) -> u32 {
        self.recent_days
    }

    pub fn horizon_days(&self) -> u32 {
        self.forecast.horizon_days
    }

    pub fn forecast(&self) -> &ForecastSettings {
        &self.forecast
    }

    pub fn anomaly(&self) -> &AnomalySettings {
        &self.anomaly
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    pub fn offset_cost_per_kg(&self) -> f64 {
        self.offset_cost_per_kg
    }

    pub fn simulation(&self) -> &SimulationSettings {
        &self.simulation
    }

    // Command line overrides
    pub fn with_input_file(mut self, path: &str) -> Self {
        self.input_file = path.to_string();
        self
    }

    pub fn with_output_dir(mut self, dir: &str) -> Self {
        self.output_dir = dir.to_string();
        self
    }

    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.forecast.horizon_days = days;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_zero_fill(mut self, zero_fill: bool) -> Self {
        self.zero_fill = zero_fill;
        self
    }
}
