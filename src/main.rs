//! Transit emissions - batch analysis of public-transport journey records
//!
//! Reads raw journey records, estimates per-trip CO2, aggregates, forecasts,
//! flags anomalous days and writes a report.
//!
//! Module structure:
//! - `domain/` - Core types (TransportMode, trips, daily aggregates)
//! - `io/` - External interfaces (trip store, report files)
//! - `services/` - Pipeline stages (estimator, normalizer, aggregator, trend, outlier)
//! - `infra/` - Infrastructure (Config)

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use transit_emissions::domain::TransportMode;
use transit_emissions::infra::Config;
use transit_emissions::io::{ReportWriter, TripStore};
use transit_emissions::services::{EmissionPipeline, TripFilter};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Transit emissions - estimate, aggregate, forecast and flag journey CO2
#[derive(Parser, Debug)]
#[command(name = "transit-emissions", version, about)]
struct Args {
    /// Path to TOML configuration file (default: CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// JSON file with raw journey records (overrides pipeline.input_file)
    #[arg(short, long)]
    input: Option<String>,

    /// Directory for report files (overrides report.output_dir)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Days to forecast past the last observed day
    #[arg(long)]
    horizon: Option<u32>,

    /// Number of highest-emission days to list
    #[arg(long)]
    top_k: Option<usize>,

    /// Only include trips on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Only include trips on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// Only include trips of this transport mode (repeatable)
    #[arg(short, long = "mode")]
    modes: Vec<String>,

    /// Insert zero-emission days for gaps in the daily series
    #[arg(long)]
    zero_fill: bool,

    /// Print the full report as JSON to stdout
    #[arg(long)]
    print_json: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date {:?}: {}", s, e))
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(version = %env!("CARGO_PKG_VERSION"), git_hash = %env!("GIT_HASH"), "transit_emissions_starting");

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let mut config = Config::load_from_path(&config_path);
    if let Some(input) = &args.input {
        config = config.with_input_file(input);
    }
    if let Some(output_dir) = &args.output_dir {
        config = config.with_output_dir(output_dir);
    }
    if let Some(horizon) = args.horizon {
        config = config.with_horizon_days(horizon);
    }
    if let Some(k) = args.top_k {
        config = config.with_top_k(k);
    }
    if args.zero_fill {
        config = config.with_zero_fill(true);
    }

    info!(
        config_file = %config.config_file(),
        input_file = %config.input_file(),
        output_dir = %config.output_dir(),
        horizon_days = %config.horizon_days(),
        min_history_days = %config.min_history_days(),
        zero_fill = %config.zero_fill(),
        contamination = %config.anomaly().contamination,
        "config_loaded"
    );

    let mut filter = TripFilter::new();
    if let Some(from) = args.from {
        filter = filter.from_date(from);
    }
    if let Some(to) = args.to {
        filter = filter.to_date(to);
    }
    if !args.modes.is_empty() {
        filter = filter.with_modes(args.modes.iter().map(|m| TransportMode::from(m.clone())).collect());
    }

    let records = TripStore::new(config.input_file())
        .load()
        .with_context(|| format!("Failed to load journey records from {}", config.input_file()))?;

    let output_dir = config.output_dir().to_string();
    let pipeline = EmissionPipeline::new(config);
    let report = pipeline.run(&records, &filter).context("Emission pipeline failed")?;
    report.summary.log();

    let files = ReportWriter::new(&output_dir)
        .write_all(&report)
        .with_context(|| format!("Failed to write report to {}", output_dir))?;

    info!(
        summary = %files.summary.display(),
        markdown = %files.markdown.display(),
        json = %files.json.display(),
        charts = %files.charts.len(),
        rejected = %report.rejected.len(),
        "transit_emissions_finished"
    );

    if args.print_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
