use crate::charts::ChartError;
use crate::config::ConfigError;
use crate::data::{CleanError, LoaderError};
use crate::stats::AggregateError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors of a report run. Trend fitting failures are not here; they are
/// carried in the report summary instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("Failed to create output directory '{0}'")]
    OutputDir(PathBuf, #[source] std::io::Error),

    #[error("Failed to write report file '{0}'")]
    ReportWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to serialize report summary")]
    Serialize(#[from] serde_json::Error),
}
