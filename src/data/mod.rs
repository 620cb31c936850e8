//! Data module - dataset loading, schema and cleaning

mod loader;
mod processor;
pub mod schema;

pub use loader::{DataLoader, DataSource, LoaderError, SourceFailure};
pub use processor::{
    CanonicalRecord, CleanError, CleanOutput, DataCleaner, QuarantineReason, QuarantinedRow,
};
pub use schema::{ColumnKind, ColumnSpec, DatasetSchema, SchemaError};
