//! # stash-core
//!
//! Core types, traits, and the import/export engine for stash, a personal
//! inventory service.
//!
//! This crate provides the entity models, the repository traits the storage
//! layer implements, and the storage-agnostic pipeline that moves items
//! between the store and flat CSV/JSON files:
//!
//! - [`normalize`]: one external record to canonical item fields
//! - [`resolve`]: get-or-create for locations, labels and currencies
//! - [`import`]: the per-record orchestration loop and ImportLog lifecycle
//! - [`export`]: CSV/JSON rendering of eagerly loaded item graphs

pub mod defaults;
pub mod error;
pub mod export;
pub mod import;
pub mod logging;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod resolve;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use export::{export_csv, export_json, ExportFile, ExportService};
pub use import::{
    decode_records, ImportAccumulator, ImportRequest, ImportService, ImportSummary, RecordWrite,
};
pub use models::*;
pub use normalize::{normalize, CsvRow, NormalizedRecord, RawRecord};
pub use resolve::ReferenceResolver;
pub use traits::*;
pub use uuid_utils::new_v7;
