//! Report egress - writes the artifacts of a pipeline run
//!
//! Files written to the output directory:
//! - `emission_summary.txt` - plain-text summary
//! - `report.md` - markdown report with the aggregate tables
//! - `emissions_by_user.csv` - user totals, highest first
//! - `daily_emissions.csv` - observed and projected daily series
//! - `report.json` - full pipeline output
//! - `*.svg` - charts linked from the markdown report (see `charts`)

use crate::error::{EmissionError, Result};
use crate::io::charts;
use crate::services::pipeline::EmissionReport;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SUMMARY_FILE: &str = "emission_summary.txt";
pub const MARKDOWN_FILE: &str = "report.md";
pub const USERS_CSV_FILE: &str = "emissions_by_user.csv";
pub const DAILY_CSV_FILE: &str = "daily_emissions.csv";
pub const JSON_FILE: &str = "report.json";

/// Paths of the files written for one report
#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub summary: PathBuf,
    pub markdown: PathBuf,
    pub users_csv: PathBuf,
    pub daily_csv: PathBuf,
    pub json: PathBuf,
    pub charts: Vec<PathBuf>,
}

#[derive(Serialize)]
struct UserRow<'a> {
    user_id: &'a str,
    emission_kg: f64,
    trips: usize,
}

#[derive(Serialize)]
struct DailyRow {
    date: String,
    emission_kg: f64,
    label: Option<&'static str>,
    forecast_kg: Option<f64>,
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self { output_dir: output_dir.as_ref().to_path_buf() }
    }

    /// Write every report artifact, creating the output directory if needed
    pub fn write_all(&self, report: &EmissionReport) -> Result<ReportFiles> {
        fs::create_dir_all(&self.output_dir)?;

        let charts = charts::render_all(&self.output_dir, report)?;
        let files = ReportFiles {
            summary: self.write_text(SUMMARY_FILE, &report.summary.to_text())?,
            markdown: self.write_text(MARKDOWN_FILE, &render_markdown(report)?)?,
            users_csv: self.write_users_csv(report)?,
            daily_csv: self.write_daily_csv(report)?,
            json: self.write_text(JSON_FILE, &serde_json::to_string_pretty(report)?)?,
            charts,
        };

        info!(output_dir = %self.output_dir.display(), charts = %files.charts.len(), "report_written");
        Ok(files)
    }

    fn write_text(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        fs::write(&path, content)?;
        debug!(file = %path.display(), bytes = %content.len(), "report_file_written");
        Ok(path)
    }

    fn write_users_csv(&self, report: &EmissionReport) -> Result<PathBuf> {
        let path = self.output_dir.join(USERS_CSV_FILE);
        let mut writer = csv::Writer::from_path(&path)?;
        for user in &report.by_user {
            writer.serialize(UserRow {
                user_id: user.user_id.as_str(),
                emission_kg: user.emission_kg,
                trips: user.trips,
            })?;
        }
        writer.flush()?;
        Ok(path)
    }

    fn write_daily_csv(&self, report: &EmissionReport) -> Result<PathBuf> {
        let path = self.output_dir.join(DAILY_CSV_FILE);
        let mut writer = csv::Writer::from_path(&path)?;
        for day in report.timeline() {
            writer.serialize(DailyRow {
                date: day.date.format("%Y-%m-%d").to_string(),
                emission_kg: day.emission_kg,
                label: day.label.map(|l| l.as_str()),
                forecast_kg: day.forecast_kg,
            })?;
        }
        writer.flush()?;
        Ok(path)
    }
}

/// Markdown rendering of a report, linking the charts by file name
pub fn render_markdown(report: &EmissionReport) -> Result<String> {
    let mut md = String::new();
    write_markdown(&mut md, report).map_err(|e| EmissionError::Render(format!("markdown: {}", e)))?;
    Ok(md)
}

fn write_markdown(md: &mut String, report: &EmissionReport) -> fmt::Result {
    let summary = &report.summary;

    writeln!(md, "# Emission Analysis Report\n")?;
    writeln!(md, "**Total Emissions ({} days):** {:.2} kg CO₂\n", summary.observed_days, summary.total_kg)?;
    writeln!(md, "**Last {} Days Emissions:** {:.2} kg CO₂\n", summary.recent_days, summary.recent_kg)?;
    writeln!(md, "**Anomaly Days Detected:** {}\n", summary.anomaly_days)?;
    writeln!(md, "**Carbon Offset Estimate:** ${:.2}\n", summary.offset_cost)?;

    writeln!(md, "## Summary\n")?;
    writeln!(md, "{}\n", summary.to_text())?;

    writeln!(md, "## Emissions by Transport Mode\n")?;
    writeln!(md, "![Emissions by transport mode]({})\n", charts::MODE_CHART_FILE)?;
    writeln!(md, "| Mode | Trips | Emission (kg CO₂) |")?;
    writeln!(md, "|------|------:|------------------:|")?;
    for mode in &report.by_mode {
        writeln!(md, "| {} | {} | {:.3} |", mode.mode, mode.trips, mode.emission_kg)?;
    }
    writeln!(md, "\n![Daily emissions by transport mode]({})", charts::DAILY_MODE_CHART_FILE)?;

    writeln!(md, "\n## Emissions by User\n")?;
    writeln!(md, "![Emissions by user]({})\n", charts::USER_CHART_FILE)?;
    writeln!(md, "| User | Trips | Emission (kg CO₂) |")?;
    writeln!(md, "|------|------:|------------------:|")?;
    for user in &report.by_user {
        writeln!(md, "| {} | {} | {:.3} |", user.user_id, user.trips, user.emission_kg)?;
    }

    writeln!(md, "\n## Top {} Emission Days\n", report.top_days.len())?;
    writeln!(md, "| Date | Emission (kg CO₂) |")?;
    writeln!(md, "|------|------------------:|")?;
    for day in &report.top_days {
        writeln!(md, "| {} | {:.3} |", day.date, day.emission_kg)?;
    }

    writeln!(md, "\n## Forecast\n")?;
    match &report.forecast {
        Some(forecast) => {
            writeln!(md, "![Emission forecast]({})\n", charts::FORECAST_CHART_FILE)?;
            writeln!(md, "| Date | Predicted (kg CO₂) | Lower | Upper |")?;
            writeln!(md, "|------|-------------------:|------:|------:|")?;
            for point in &forecast.projected {
                writeln!(
                    md,
                    "| {} | {:.3} | {:.3} | {:.3} |",
                    point.date, point.predicted_kg, point.lower_kg, point.upper_kg
                )?;
            }
        }
        None => writeln!(md, "Not enough history to forecast.")?,
    }

    writeln!(md, "\n## Anomalies\n")?;
    writeln!(md, "![Daily emissions with anomalies]({})\n", charts::ANOMALY_CHART_FILE)?;
    let anomalous: Vec<_> = report.anomalous_days().collect();
    if anomalous.is_empty() {
        writeln!(md, "No anomalous days detected.")?;
    } else {
        writeln!(md, "| Date | Emission (kg CO₂) |")?;
        writeln!(md, "|------|------------------:|")?;
        for day in anomalous {
            writeln!(md, "| {} | {:.3} |", day.date, day.emission_kg)?;
        }
    }

    if !report.rejected.is_empty() {
        writeln!(md, "\n## Rejected Records\n")?;
        for rejected in &report.rejected {
            writeln!(md, "- record {}: {}", rejected.index, rejected.reason)?;
        }
    }

    Ok(())
}
