//! SVG charts embedded in the markdown report
//!
//! Rendered with the plotters SVG backend, so no system fonts are needed:
//! text is written as SVG `<text>` elements.

use crate::domain::aggregate::{DailyAggregate, DayModeTotal, Forecast, ModeSummary, UserSummary};
use crate::error::{EmissionError, Result};
use crate::services::pipeline::EmissionReport;
use chrono::NaiveDate;
use plotters::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MODE_CHART_FILE: &str = "emissions_by_mode.svg";
pub const DAILY_MODE_CHART_FILE: &str = "daily_emissions_by_mode.svg";
pub const USER_CHART_FILE: &str = "emissions_by_user.svg";
pub const FORECAST_CHART_FILE: &str = "forecast.svg";
pub const ANOMALY_CHART_FILE: &str = "anomalies.svg";

const CHART_SIZE: (u32, u32) = (1200, 700);

type ChartResult = std::result::Result<(), Box<dyn Error>>;

fn palette() -> [RGBColor; 8] {
    [
        RGBColor(31, 119, 180),  // blue
        RGBColor(255, 127, 14),  // orange
        RGBColor(44, 160, 44),   // green
        RGBColor(214, 39, 40),   // red
        RGBColor(148, 103, 189), // purple
        RGBColor(140, 86, 75),   // brown
        RGBColor(227, 119, 194), // pink
        RGBColor(127, 127, 127), // grey
    ]
}

/// Render every chart for a report into `output_dir`
///
/// The forecast chart is only written when the report carries a forecast.
pub fn render_all(output_dir: &Path, report: &EmissionReport) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let path = output_dir.join(MODE_CHART_FILE);
    render_mode_chart(&path, &report.by_mode)?;
    written.push(path);

    let path = output_dir.join(DAILY_MODE_CHART_FILE);
    render_daily_mode_chart(&path, &report.by_day_and_mode)?;
    written.push(path);

    let path = output_dir.join(USER_CHART_FILE);
    render_user_chart(&path, &report.by_user)?;
    written.push(path);

    if let Some(forecast) = &report.forecast {
        let path = output_dir.join(FORECAST_CHART_FILE);
        render_forecast_chart(&path, &report.daily, forecast)?;
        written.push(path);
    }

    let path = output_dir.join(ANOMALY_CHART_FILE);
    render_anomaly_chart(&path, &report.daily)?;
    written.push(path);

    debug!(charts = %written.len(), "charts_rendered");
    Ok(written)
}

fn render(path: &Path, draw: impl FnOnce(&Path) -> ChartResult) -> Result<()> {
    draw(path).map_err(|e| EmissionError::Render(format!("{}: {}", path.display(), e)))
}

/// Upper bound of a value axis, padded by 10%
fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn date_label(dates: &[NaiveDate], idx: usize) -> String {
    dates.get(idx).map(|d| d.format("%m-%d").to_string()).unwrap_or_default()
}

/// Vertical bars, one per label, in the given order
fn bar_chart(path: &Path, caption: &str, x_desc: &str, bars: &[(String, f64)]) -> ChartResult {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 30))
        .margin(30)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0..bars.len().max(1), 0.0..axis_max(bars.iter().map(|(_, v)| *v)))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len().max(1))
        .x_label_formatter(&|idx| bars.get(*idx).map(|(label, _)| label.clone()).unwrap_or_default())
        .x_desc(x_desc)
        .y_desc("Emission (kg CO2)")
        .label_style(("sans-serif", 18))
        .draw()?;

    let colors = palette();
    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        let color = colors[i % colors.len()];
        Rectangle::new([(i, 0.0), (i + 1, *value)], color.filled())
    }))?;

    root.present()?;
    Ok(())
}

pub fn render_mode_chart(path: &Path, modes: &[ModeSummary]) -> Result<()> {
    let bars: Vec<(String, f64)> = modes.iter().map(|m| (m.mode.to_string(), m.emission_kg)).collect();
    render(path, |p| bar_chart(p, "Emissions by Transport Mode", "Transport mode", &bars))
}

pub fn render_user_chart(path: &Path, users: &[UserSummary]) -> Result<()> {
    let bars: Vec<(String, f64)> = users.iter().map(|u| (u.user_id.to_string(), u.emission_kg)).collect();
    render(path, |p| bar_chart(p, "Emissions by User", "User", &bars))
}

/// Stacked daily bars, one segment per transport mode
pub fn render_daily_mode_chart(path: &Path, cells: &[DayModeTotal]) -> Result<()> {
    render(path, |p| {
        let dates: Vec<NaiveDate> = cells.iter().map(|c| c.date).collect::<BTreeSet<_>>().into_iter().collect();
        let mut modes: Vec<String> = cells.iter().map(|c| c.mode.to_string()).collect();
        modes.sort();
        modes.dedup();

        let mut day_totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for cell in cells {
            *day_totals.entry(cell.date).or_insert(0.0) += cell.emission_kg;
        }

        let root = SVGBackend::new(p, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Daily Emissions by Transport Mode", ("sans-serif", 30))
            .margin(30)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0..dates.len().max(1), 0.0..axis_max(day_totals.values().copied()))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(dates.len().clamp(1, 15))
            .x_label_formatter(&|idx| date_label(&dates, *idx))
            .x_desc("Date")
            .y_desc("Emission (kg CO2)")
            .label_style(("sans-serif", 18))
            .draw()?;

        let colors = palette();
        let mut base = vec![0.0; dates.len()];
        for (m, mode) in modes.iter().enumerate() {
            let color = colors[m % colors.len()];
            let mut segments = Vec::new();
            for cell in cells.iter().filter(|c| c.mode.as_str() == mode) {
                if let Ok(i) = dates.binary_search(&cell.date) {
                    let bottom = base[i];
                    base[i] += cell.emission_kg;
                    segments.push(Rectangle::new([(i, bottom), (i + 1, base[i])], color.filled()));
                }
            }
            chart
                .draw_series(segments)?
                .label(mode.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font(("sans-serif", 18))
            .draw()?;

        root.present()?;
        Ok(())
    })
}

/// Observed series, fitted values and the projected horizon with its band
pub fn render_forecast_chart(path: &Path, daily: &[DailyAggregate], forecast: &Forecast) -> Result<()> {
    render(path, |p| {
        let dates: Vec<NaiveDate> =
            daily.iter().map(|d| d.date).chain(forecast.projected.iter().map(|f| f.date)).collect();
        let index_of = |date: NaiveDate| dates.iter().position(|d| *d == date).unwrap_or(0);

        let points = forecast.fitted.iter().chain(&forecast.projected);
        let y_max = axis_max(daily.iter().map(|d| d.emission_kg).chain(points.clone().map(|f| f.upper_kg)));
        let y_min = points.map(|f| f.lower_kg).fold(0.0_f64, f64::min);

        let root = SVGBackend::new(p, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Emission Forecast ({})", forecast.model), ("sans-serif", 30))
            .margin(30)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0..dates.len().max(1), y_min..y_max)?;

        chart
            .configure_mesh()
            .x_labels(dates.len().clamp(1, 15))
            .x_label_formatter(&|idx| date_label(&dates, *idx))
            .x_desc("Date")
            .y_desc("Emission (kg CO2)")
            .label_style(("sans-serif", 18))
            .draw()?;

        if !forecast.projected.is_empty() {
            let upper = forecast.projected.iter().map(|f| (index_of(f.date), f.upper_kg));
            let lower = forecast.projected.iter().rev().map(|f| (index_of(f.date), f.lower_kg));
            chart
                .draw_series(std::iter::once(Polygon::new(upper.chain(lower).collect::<Vec<_>>(), BLUE.mix(0.2).filled())))?
                .label("interval")
                .legend(|(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], BLUE.mix(0.2).filled()));
        }

        chart
            .draw_series(LineSeries::new(daily.iter().map(|d| (index_of(d.date), d.emission_kg)), BLACK.stroke_width(2)))?
            .label("observed")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(2)));

        chart
            .draw_series(LineSeries::new(
                forecast.fitted.iter().chain(&forecast.projected).map(|f| (index_of(f.date), f.predicted_kg)),
                BLUE.stroke_width(2),
            ))?
            .label("forecast")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font(("sans-serif", 18))
            .draw()?;

        root.present()?;
        Ok(())
    })
}

/// Daily series with anomalous days marked
pub fn render_anomaly_chart(path: &Path, daily: &[DailyAggregate]) -> Result<()> {
    render(path, |p| {
        let dates: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();

        let root = SVGBackend::new(p, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Daily Emissions with Anomalies", ("sans-serif", 30))
            .margin(30)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0..dates.len().max(1), 0.0..axis_max(daily.iter().map(|d| d.emission_kg)))?;

        chart
            .configure_mesh()
            .x_labels(dates.len().clamp(1, 15))
            .x_label_formatter(&|idx| date_label(&dates, *idx))
            .x_desc("Date")
            .y_desc("Emission (kg CO2)")
            .label_style(("sans-serif", 18))
            .draw()?;

        chart
            .draw_series(LineSeries::new(daily.iter().enumerate().map(|(i, d)| (i, d.emission_kg)), BLUE.stroke_width(2)))?
            .label("daily emission")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));

        chart
            .draw_series(
                daily
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| d.is_anomalous())
                    .map(|(i, d)| Circle::new((i, d.emission_kg), 7, RED.filled())),
            )?
            .label("anomaly")
            .legend(|(x, y)| Circle::new((x + 10, y), 7, RED.filled()));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font(("sans-serif", 18))
            .draw()?;

        root.present()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ForecastPoint, OutlierLabel, TransportMode, UserId};
    use std::fs;
    use tempfile::tempdir;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1 + n).unwrap()
    }

    fn series() -> Vec<DailyAggregate> {
        (0..10)
            .map(|n| {
                let kg = if n == 6 { 9.0 } else { 1.0 + f64::from(n) * 0.1 };
                DailyAggregate { label: Some(OutlierLabel::from_flag(n == 6)), ..DailyAggregate::new(day(n), kg) }
            })
            .collect()
    }

    fn assert_svg(path: &Path) {
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("<svg"), "{} is not an SVG", path.display());
    }

    #[test]
    fn test_bar_charts_are_written() {
        let dir = tempdir().unwrap();
        let modes = vec![
            ModeSummary { mode: TransportMode::Bus, emission_kg: 4.2, trips: 3 },
            ModeSummary { mode: TransportMode::Train, emission_kg: 1.1, trips: 2 },
        ];
        let users = vec![UserSummary { user_id: UserId("user_1".to_string()), emission_kg: 5.3, trips: 5 }];

        let mode_path = dir.path().join(MODE_CHART_FILE);
        render_mode_chart(&mode_path, &modes).unwrap();
        assert_svg(&mode_path);
        assert!(fs::read_to_string(&mode_path).unwrap().contains("Emissions by Transport Mode"));

        let user_path = dir.path().join(USER_CHART_FILE);
        render_user_chart(&user_path, &users).unwrap();
        assert_svg(&user_path);
    }

    #[test]
    fn test_stacked_daily_chart_has_mode_legend() {
        let dir = tempdir().unwrap();
        let cells = vec![
            DayModeTotal { date: day(0), mode: TransportMode::Bus, emission_kg: 1.0 },
            DayModeTotal { date: day(0), mode: TransportMode::Tram, emission_kg: 0.5 },
            DayModeTotal { date: day(1), mode: TransportMode::Bus, emission_kg: 2.0 },
        ];

        let path = dir.path().join(DAILY_MODE_CHART_FILE);
        render_daily_mode_chart(&path, &cells).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("bus"));
        assert!(content.contains("tram"));
    }

    #[test]
    fn test_forecast_and_anomaly_charts_are_written() {
        let dir = tempdir().unwrap();
        let daily = series();
        let point = |date, kg: f64| ForecastPoint { date, predicted_kg: kg, lower_kg: kg - 0.5, upper_kg: kg + 0.5 };
        let forecast = Forecast {
            model: "linear_trend".to_string(),
            fitted: daily.iter().map(|d| point(d.date, d.emission_kg)).collect(),
            projected: (10..13).map(|n| point(day(n), 2.0)).collect(),
        };

        let forecast_path = dir.path().join(FORECAST_CHART_FILE);
        render_forecast_chart(&forecast_path, &daily, &forecast).unwrap();
        assert_svg(&forecast_path);
        assert!(fs::read_to_string(&forecast_path).unwrap().contains("linear_trend"));

        let anomaly_path = dir.path().join(ANOMALY_CHART_FILE);
        render_anomaly_chart(&anomaly_path, &daily).unwrap();
        let content = fs::read_to_string(&anomaly_path).unwrap();
        assert!(content.contains("<circle"));
        assert!(content.contains("anomaly"));
    }

    #[test]
    fn test_empty_inputs_still_render() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MODE_CHART_FILE);
        render_mode_chart(&path, &[]).unwrap();
        assert_svg(&path);
    }

    #[test]
    fn test_unwritable_path_is_render_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join(MODE_CHART_FILE);
        let result = render_mode_chart(&path, &[]);
        assert!(matches!(result, Err(EmissionError::Render(_))));
    }
}
