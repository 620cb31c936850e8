//! Shooting Insights - NYPD Shooting Incident Data Report
//!
//! Downloads the public shooting-incident dataset, cleans it into a canonical
//! table, and produces grouped summaries, a linear trend and static charts.

pub mod charts;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod stats;

pub use config::ReportConfig;
pub use error::PipelineError;
pub use pipeline::{Analysis, Pipeline, PipelineOutcome};
