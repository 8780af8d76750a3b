//! Error taxonomy for the emission pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmissionError>;

#[derive(Error, Debug)]
pub enum EmissionError {
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Insufficient history: {observed} distinct day(s) observed, at least {required} required")]
    InsufficientHistory { observed: usize, required: usize },

    #[error("No valid trip records in input ({rejected} rejected)")]
    EmptyInput { rejected: usize },

    #[error("Forecast model failed: {0}")]
    ForecastFailed(String),

    #[error("Outlier detection failed: {0}")]
    OutlierDetectionFailed(String),

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
