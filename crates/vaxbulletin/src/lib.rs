//! Incremental extraction of vaccination bulletins and reconciliation into a
//! canonical per-location, per-date dataset.

pub mod browser;
pub mod config;
pub mod extractor;
pub mod merge;
pub mod parser;
pub mod source;
pub mod store;
pub mod types;

pub use config::ExtractorConfig;
pub use extractor::{ExportError, Extractor};
pub use source::Source;
pub use store::{DatasetStore, JsonFileStore, MemoryStore};
