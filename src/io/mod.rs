//! IO modules - external file interfaces
//!
//! - `trip_store` - JSON file of raw journey records (read, append)
//! - `report` - Report artifacts (text, markdown, CSV, JSON)
//! - `charts` - SVG charts linked from the markdown report

pub mod charts;
pub mod report;
pub mod trip_store;

// Re-export commonly used types
pub use report::{render_markdown, ReportFiles, ReportWriter};
pub use trip_store::TripStore;
