/// Dataset state module
///
/// This module handles the in-memory dataset, including:
/// - Per-image records and shapes (record.rs)
/// - The ordered dataset table with its derive/filter/sort steps (table.rs)
/// - Analysis parameters loaded from flags or JSON (config.rs)

pub mod config;
pub mod record;
pub mod table;

pub use config::{AnalysisConfig, ProbePolicy};
pub use record::Record;
pub use table::DatasetTable;
