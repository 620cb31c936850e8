//! Report configuration, loaded from an optional JSON file.

use crate::data::DataSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// NYPD Shooting Incident Data (Historic), NYC Open Data CSV export.
pub const DEFAULT_SOURCE: &str =
    "https://data.cityofnewyork.us/api/views/833y-fsy8/rows.csv?accessType=DOWNLOAD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Invalid config file '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),
    #[error("Invalid config value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// URL or local path of the dataset
    pub source: String,
    pub output_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub render_charts: bool,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            output_dir: PathBuf::from("report"),
            fetch_timeout_secs: 60,
            render_charts: true,
            chart_width: 1000,
            chart_height: 700,
        }
    }
}

impl ReportConfig {
    /// Read a JSON config; omitted fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source",
                message: "must not be empty".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if self.chart_width < 200 || self.chart_height < 200 {
            return Err(ConfigError::Invalid {
                field: "chart_width/chart_height",
                message: format!(
                    "{}x{} is too small, minimum is 200x200",
                    self.chart_width, self.chart_height
                ),
            });
        }
        Ok(())
    }

    pub fn data_source(&self) -> DataSource {
        DataSource::parse(self.source.trim())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
