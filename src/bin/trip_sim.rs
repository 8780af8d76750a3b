//! Trip simulator - generates synthetic journey records
//!
//! Appends simulated journeys around the configured city centre to the
//! journey record file, one batch per day for the configured number of days
//! up to today.
//!
//! Usage:
//!   cargo run --bin trip-sim
//!   cargo run --bin trip-sim -- --days 30 --seed 7 --output data/sim.json

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use transit_emissions::infra::Config;
use transit_emissions::io::TripStore;
use transit_emissions::services::{EmissionEstimator, TripSimulator};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "trip-sim", version)]
#[command(about = "Generate synthetic public-transport journey records")]
struct Args {
    /// Path to TOML configuration file (default: CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// File to append records to (default: pipeline.input_file)
    #[arg(short, long)]
    output: Option<String>,

    /// Days of history to generate, ending today
    #[arg(short, long)]
    days: Option<u32>,

    /// Journeys per simulated day
    #[arg(short, long)]
    journeys_per_day: Option<u32>,

    /// RNG seed for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    let mut settings = config.simulation().clone();
    if let Some(days) = args.days {
        settings.days = days;
    }
    if let Some(journeys) = args.journeys_per_day {
        settings.journeys_per_day = journeys;
    }
    let output = args.output.clone().unwrap_or_else(|| config.input_file().to_string());

    info!(
        config_file = %config.config_file(),
        output = %output,
        days = %settings.days,
        journeys_per_day = %settings.journeys_per_day,
        seed = ?args.seed,
        "trip_sim_starting"
    );

    let estimator = EmissionEstimator::new(config.emission_factors().clone());
    let mut simulator = TripSimulator::new(settings, estimator, args.seed);
    let records = simulator
        .generate_until(Utc::now().date_naive())
        .context("Failed to generate journeys")?;

    let total = TripStore::new(&output)
        .append(&records)
        .with_context(|| format!("Failed to append journeys to {}", output))?;

    info!(generated = %records.len(), total = %total, output = %output, "trip_sim_finished");
    Ok(())
}
