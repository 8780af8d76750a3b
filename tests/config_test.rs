//! Integration tests for configuration loading

use std::io::Write;
use tempfile::NamedTempFile;
use transit_emissions::domain::TransportMode;
use transit_emissions::infra::Config;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[emission]
train = 0.04
bus = 0.09
fallback_factor = 0.07

[emission.other]
Ferry = 0.12

[pipeline]
input_file = "data/test.json"
min_history_days = 5
zero_fill = true
top_k = 3
recent_days = 14

[forecast]
horizon_days = 10
weekly_seasonality = false
interval_width = 0.9

[anomaly]
contamination = 0.05
n_trees = 50
seed = 7

[report]
output_dir = "out/reports"
offset_cost_per_kg = 0.02

[simulation]
users = ["alice", "bob"]
days = 10
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    let factors = config.emission_factors();
    assert_eq!(factors.factor_for(&TransportMode::Train), 0.04);
    assert_eq!(factors.factor_for(&TransportMode::Bus), 0.09);
    assert_eq!(factors.factor_for(&TransportMode::Tram), 0.04);
    // Keys are matched case-insensitively against record modes
    assert_eq!(factors.factor_for(&TransportMode::from("ferry".to_string())), 0.12);
    assert_eq!(factors.factor_for(&TransportMode::from("FERRY".to_string())), 0.12);
    assert_eq!(factors.factor_for(&TransportMode::Other("gondola".to_string())), 0.07);

    assert_eq!(config.input_file(), "data/test.json");
    assert_eq!(config.min_history_days(), 5);
    assert!(config.zero_fill());
    assert_eq!(config.top_k(), 3);
    assert_eq!(config.recent_days(), 14);
    assert_eq!(config.horizon_days(), 10);
    assert!(!config.forecast().weekly_seasonality);
    assert_eq!(config.forecast().fourier_order, 3);
    assert_eq!(config.anomaly().contamination, 0.05);
    assert_eq!(config.anomaly().n_trees, 50);
    assert_eq!(config.anomaly().max_samples, 256);
    assert_eq!(config.anomaly().seed, 7);
    assert_eq!(config.output_dir(), "out/reports");
    assert_eq!(config.offset_cost_per_kg(), 0.02);
    assert_eq!(config.simulation().users, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(config.simulation().days, 10);
    assert_eq!(config.simulation().journeys_per_day, 3);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[anomaly]\ncontamination = 0.9\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());

    // load_from_path falls back to defaults instead
    let config = Config::load_from_path(temp_file.path().to_str().unwrap());
    assert_eq!(config.anomaly().contamination, 0.1);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.input_file(), "data/data.json");
    assert_eq!(config.horizon_days(), 7);
    assert_eq!(config.output_dir(), "reports");
    assert_eq!(config.emission_factors().factor_for(&TransportMode::Subway), 0.06);
}

#[test]
fn test_shipped_dev_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml");
    let config = Config::from_file(path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.emission_factors().factor_for(&TransportMode::Bus), 0.08);
}
