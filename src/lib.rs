//! Listing ingestion: fetch configured listing pages, pull out classified
//! identifiers, store the unseen ones and keep per-run found/added metrics.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod import;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod types;

pub use config::Settings;
pub use db::Store;
pub use error::{ScoutError, StoreError};
pub use pipeline::Pipeline;
pub use types::{Category, IdentifierRecord, MetricsEntry, SourceConfig};
