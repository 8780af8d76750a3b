//! Integration tests for the emission pipeline and report egress

use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;
use transit_emissions::domain::{DailyAggregate, Forecast, ForecastPoint, TransportMode};
use transit_emissions::error::EmissionError;
use transit_emissions::infra::Config;
use transit_emissions::io::{render_markdown, ReportWriter, TripStore};
use transit_emissions::services::estimator::estimate_emission;
use transit_emissions::services::{EmissionPipeline, OutlierDetector, TrendEstimator, TripFilter};

// Alexanderplatz -> Potsdamer Platz
const FROM: (f64, f64) = (52.521918, 13.413215);
const TO: (f64, f64) = (52.509663, 13.376481);

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(n)
}

fn record(date: NaiveDate, user: &str, mode: &str) -> Value {
    json!({
        "user_id": user,
        "startingAddress": "Alexanderplatz",
        "destinationAddress": "Potsdamer Platz",
        "dateTime": format!("{}T08:30:00Z", date.format("%Y-%m-%d")),
        "transportMode": mode,
        "fromStops": [{"location": {"latitude": FROM.0, "longitude": FROM.1}}],
        "toStops": [{"location": {"latitude": TO.0, "longitude": TO.1}}]
    })
}

/// One train trip per day for 20 days, ten on day 10
fn spiky_month() -> Vec<Value> {
    let mut records = Vec::new();
    for n in 0..20 {
        let trips = if n == 10 { 10 } else { 1 };
        for _ in 0..trips {
            records.push(record(day(n), "user_1", "train"));
        }
    }
    records
}

fn train_trip_kg() -> f64 {
    estimate_emission(FROM.0, FROM.1, TO.0, TO.1, &TransportMode::Train).unwrap()
}

struct ConstantTrend;

impl TrendEstimator for ConstantTrend {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn fit_predict(&self, series: &[DailyAggregate], horizon_days: u32) -> transit_emissions::Result<Forecast> {
        let last = series.last().map(|d| d.date).unwrap();
        let point = |date| ForecastPoint { date, predicted_kg: 1.0, lower_kg: 0.5, upper_kg: 1.5 };
        Ok(Forecast {
            model: self.name().to_string(),
            fitted: series.iter().map(|d| point(d.date)).collect(),
            projected: (1..=i64::from(horizon_days)).map(|n| point(last + Duration::days(n))).collect(),
        })
    }
}

struct FlagFirst;

impl OutlierDetector for FlagFirst {
    fn name(&self) -> &'static str {
        "flag_first"
    }

    fn fit_predict(&self, values: &[f64]) -> transit_emissions::Result<Vec<bool>> {
        Ok((0..values.len()).map(|i| i == 0).collect())
    }
}

struct WrongLength;

impl OutlierDetector for WrongLength {
    fn name(&self) -> &'static str {
        "wrong_length"
    }

    fn fit_predict(&self, _values: &[f64]) -> transit_emissions::Result<Vec<bool>> {
        Ok(vec![true])
    }
}

#[test]
fn test_end_to_end_flags_spike_and_forecasts() {
    let report = EmissionPipeline::new(Config::default()).run(&spiky_month(), &TripFilter::new()).unwrap();
    let kg = train_trip_kg();

    assert_eq!(report.input_records, 29);
    assert_eq!(report.trips, 29);
    assert!(report.rejected.is_empty());
    assert_eq!(report.daily.len(), 20);
    assert!((report.summary.total_kg - 29.0 * kg).abs() < 1e-9);

    // Last 7 calendar days: days 13..=19, one trip each
    assert!((report.summary.recent_kg - 7.0 * kg).abs() < 1e-9);

    let anomalous: Vec<NaiveDate> = report.anomalous_days().map(|d| d.date).collect();
    assert_eq!(anomalous, vec![day(10)]);
    assert_eq!(report.summary.anomaly_days, 1);
    assert!(report.daily.iter().all(|d| d.label.is_some()));

    let forecast = report.forecast.as_ref().unwrap();
    assert_eq!(forecast.projected.len(), 7);
    assert_eq!(forecast.projected[0].date, day(20));
    assert!(forecast.projected.iter().all(|p| p.lower_kg <= p.predicted_kg && p.predicted_kg <= p.upper_kg));
    assert!(report.summary.projected_kg.is_some());

    assert_eq!(report.top_days[0].date, day(10));
    assert_eq!(report.top_days.len(), 5);
    assert_eq!(report.by_mode.len(), 1);
    assert_eq!(report.by_mode[0].trips, 29);
    assert_eq!(report.timeline().len(), 27);
}

#[test]
fn test_malformed_records_are_skipped() {
    let mut records = spiky_month();
    records.push(json!({"dateTime": "not a date", "transportMode": "bus"}));
    records.push(json!({"dateTime": "2024-03-02T10:00:00Z", "fromStops": []}));
    records.push(json!("just a string"));

    let report = EmissionPipeline::new(Config::default()).run(&records, &TripFilter::new()).unwrap();
    assert_eq!(report.input_records, 32);
    assert_eq!(report.trips, 29);
    let rejected: Vec<usize> = report.rejected.iter().map(|r| r.index).collect();
    assert_eq!(rejected, vec![29, 30, 31]);
}

#[test]
fn test_no_valid_record_is_empty_input() {
    let records = vec![json!({"transportMode": "bus"}), json!(42)];
    let result = EmissionPipeline::new(Config::default()).run(&records, &TripFilter::new());
    assert!(matches!(result, Err(EmissionError::EmptyInput { rejected: 2 })));
}

#[test]
fn test_single_day_has_no_forecast() {
    let records = vec![record(day(0), "user_1", "bus"), record(day(0), "user_2", "tram")];
    let report = EmissionPipeline::new(Config::default()).run(&records, &TripFilter::new()).unwrap();

    assert!(report.forecast.is_none());
    assert!(report.summary.projected_kg.is_none());

    let markdown = render_markdown(&report).unwrap();
    assert!(markdown.contains("Not enough history to forecast."));
    assert!(!markdown.contains("forecast.svg"));
    assert!(markdown.contains("](anomalies.svg)"));
    assert_eq!(report.daily.len(), 1);
    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.by_user.len(), 2);
    // Bus (0.08) emits more than tram (0.04) over the same distance
    assert_eq!(report.by_user[0].user_id.as_str(), "user_1");
}

#[test]
fn test_injected_capabilities_are_used() {
    let pipeline = EmissionPipeline::new(Config::default())
        .with_trend_estimator(Box::new(ConstantTrend))
        .with_outlier_detector(Box::new(FlagFirst));
    let report = pipeline.run(&spiky_month(), &TripFilter::new()).unwrap();

    let forecast = report.forecast.as_ref().unwrap();
    assert_eq!(forecast.model, "constant");
    assert!((report.summary.projected_kg.unwrap() - 7.0).abs() < 1e-12);

    let anomalous: Vec<NaiveDate> = report.anomalous_days().map(|d| d.date).collect();
    assert_eq!(anomalous, vec![day(0)]);
}

#[test]
fn test_outlier_label_mismatch_fails() {
    let pipeline = EmissionPipeline::new(Config::default()).with_outlier_detector(Box::new(WrongLength));
    let result = pipeline.run(&spiky_month(), &TripFilter::new());
    assert!(matches!(result, Err(EmissionError::OutlierDetectionFailed(_))));
}

#[test]
fn test_zero_fill_inserts_missing_days() {
    let records = vec![
        record(day(0), "user_1", "train"),
        record(day(1), "user_1", "train"),
        record(day(4), "user_1", "train"),
    ];

    let sparse = EmissionPipeline::new(Config::default()).run(&records, &TripFilter::new()).unwrap();
    assert_eq!(sparse.daily.len(), 3);

    let filled = EmissionPipeline::new(Config::default().with_zero_fill(true))
        .run(&records, &TripFilter::new())
        .unwrap();
    assert_eq!(filled.daily.len(), 5);
    assert_eq!(filled.daily[2].date, day(2));
    assert_eq!(filled.daily[2].emission_kg, 0.0);
    assert!((filled.summary.total_kg - sparse.summary.total_kg).abs() < 1e-12);
}

#[test]
fn test_filter_by_date_and_mode() {
    let mut records = spiky_month();
    records.push(record(day(3), "user_2", "Bus"));
    records.push(record(day(4), "user_2", "bus"));

    let filter = TripFilter::new().from_date(day(3)).to_date(day(5)).with_modes(vec![TransportMode::Bus]);
    let report = EmissionPipeline::new(Config::default()).run(&records, &filter).unwrap();

    assert_eq!(report.trips, 2);
    assert_eq!(report.daily.len(), 2);
    assert_eq!(report.by_mode[0].mode, TransportMode::Bus);
    assert!(report.forecast.is_some());
}

#[test]
fn test_report_files_written_from_stored_records() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("data.json");
    fs::write(&input, serde_json::to_string(&spiky_month()).unwrap()).unwrap();

    let records = TripStore::new(input.to_str().unwrap()).load().unwrap();
    let report = EmissionPipeline::new(Config::default()).run(&records, &TripFilter::new()).unwrap();

    let output_dir = dir.path().join("reports");
    let files = ReportWriter::new(&output_dir).write_all(&report).unwrap();

    let summary = fs::read_to_string(&files.summary).unwrap();
    assert!(summary.starts_with("Summary Report:"));
    assert!(summary.contains("1 anomaly days were detected."));

    let markdown = fs::read_to_string(&files.markdown).unwrap();
    assert!(markdown.starts_with("# Emission Analysis Report"));
    assert!(markdown.contains("## Anomalies"));
    assert!(markdown.contains("| 2024-03-11 |"));

    let chart_names: Vec<String> =
        files.charts.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(
        chart_names,
        vec![
            "emissions_by_mode.svg",
            "daily_emissions_by_mode.svg",
            "emissions_by_user.svg",
            "forecast.svg",
            "anomalies.svg"
        ]
    );
    for (chart, name) in files.charts.iter().zip(&chart_names) {
        assert!(fs::read_to_string(chart).unwrap().contains("<svg"));
        assert!(markdown.contains(&format!("]({})", name)), "{} not linked", name);
    }

    let users = fs::read_to_string(&files.users_csv).unwrap();
    let mut lines = users.lines();
    assert_eq!(lines.next(), Some("user_id,emission_kg,trips"));
    assert!(lines.next().unwrap().starts_with("user_1,"));

    let daily = fs::read_to_string(&files.daily_csv).unwrap();
    assert_eq!(daily.lines().count(), 1 + 20 + 7);
    assert!(daily.lines().next().unwrap() == "date,emission_kg,label,forecast_kg");
    assert!(daily.contains("2024-03-11,"));
    assert!(daily.contains(",anomalous,"));

    let json: Value = serde_json::from_str(&fs::read_to_string(&files.json).unwrap()).unwrap();
    assert_eq!(json["trips"], 29);
    assert_eq!(json["summary"]["anomaly_days"], 1);
}
