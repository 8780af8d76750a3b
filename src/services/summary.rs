//! Headline figures of a pipeline run and their plain-text rendering

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionSummary {
    pub total_kg: f64,
    /// Emission over the last `recent_days` calendar days
    pub recent_kg: f64,
    pub recent_days: u32,
    /// Number of daily aggregates in the analysed series
    pub observed_days: usize,
    pub anomaly_days: usize,
    /// Sum of the projected horizon, when a forecast was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_kg: Option<f64>,
    pub offset_cost_per_kg: f64,
    pub offset_cost: f64,
}

impl EmissionSummary {
    pub fn new(
        total_kg: f64,
        recent_kg: f64,
        recent_days: u32,
        observed_days: usize,
        anomaly_days: usize,
        offset_cost_per_kg: f64,
    ) -> Self {
        Self {
            total_kg,
            recent_kg,
            recent_days,
            observed_days,
            anomaly_days,
            projected_kg: None,
            offset_cost_per_kg,
            offset_cost: total_kg * offset_cost_per_kg,
        }
    }

    pub fn with_projection(mut self, projected_kg: f64) -> Self {
        self.projected_kg = Some(projected_kg);
        self
    }

    /// Plain-text summary as written to `emission_summary.txt`
    pub fn to_text(&self) -> String {
        let mut text = String::from("Summary Report:\n");
        text.push_str(&format!(
            "In the last {} days, total emissions were {:.2} kg CO2.\n",
            self.recent_days, self.recent_kg
        ));
        text.push_str(&format!(
            "Total emissions over {} days: {:.2} kg CO2.\n",
            self.observed_days, self.total_kg
        ));
        text.push_str(&format!("{} anomaly days were detected.\n", self.anomaly_days));
        if let Some(projected) = self.projected_kg {
            text.push_str(&format!("Forecast emissions for the coming days: {:.2} kg CO2.\n", projected));
        }
        text.push_str(&format!(
            "Estimated Carbon Offset Cost: ${:.2} (at ${:.2} per kg CO2)\n",
            self.offset_cost, self.offset_cost_per_kg
        ));
        text.push_str(
            "Suggested Action: Investigate the anomaly days for unusual travel patterns or data errors. \
             Consider strategies to reduce emissions on high-output days.",
        );
        text
    }

    pub fn log(&self) {
        info!(
            total_kg = %format!("{:.2}", self.total_kg),
            recent_kg = %format!("{:.2}", self.recent_kg),
            recent_days = %self.recent_days,
            observed_days = %self.observed_days,
            anomaly_days = %self.anomaly_days,
            projected_kg = ?self.projected_kg,
            offset_cost = %format!("{:.2}", self.offset_cost),
            "emission_summary"
        );
    }
}
