//! Trip store - the JSON file of raw journey records
//!
//! The file holds a JSON array of records; a single top-level object is
//! accepted as a one-record file.

use crate::domain::trip::RawTripRecord;
use crate::error::{EmissionError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub struct TripStore {
    file_path: String,
}

impl TripStore {
    pub fn new(file_path: &str) -> Self {
        debug!(file_path = %file_path, "trip_store_initialized");
        Self { file_path: file_path.to_string() }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Read every record; the file must exist and be valid JSON
    pub fn load(&self) -> Result<Vec<Value>> {
        let content = fs::read_to_string(&self.file_path)?;
        let records = match serde_json::from_str::<Value>(&content)? {
            Value::Array(records) => records,
            record @ Value::Object(_) => vec![record],
            other => {
                return Err(EmissionError::MalformedRecord(format!(
                    "expected an array of records, found {}",
                    json_type(&other)
                )));
            }
        };
        info!(file = %self.file_path, records = %records.len(), "trip_records_loaded");
        Ok(records)
    }

    /// Like `load`, but a missing file is an empty store
    pub fn load_or_empty(&self) -> Result<Vec<Value>> {
        if !Path::new(&self.file_path).exists() {
            return Ok(Vec::new());
        }
        self.load()
    }

    /// Append records and rewrite the file; returns the new record count
    pub fn append(&self, records: &[RawTripRecord]) -> Result<usize> {
        let mut all = self.load_or_empty()?;
        for record in records {
            all.push(serde_json::to_value(record)?);
        }

        let path = Path::new(&self.file_path);
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(&all)?)?;

        info!(file = %self.file_path, appended = %records.len(), total = %all.len(), "trip_records_appended");
        Ok(all.len())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
