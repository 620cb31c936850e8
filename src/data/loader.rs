//! Dataset Loader Module
//! Fetches the delimited incident dataset and parses it with Polars.

use crate::data::schema::{DatasetSchema, SchemaError};
use log::{info, warn};
use polars::prelude::*;
use reqwest::blocking::Client;
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a source could not be turned into a table.
#[derive(Error, Debug)]
pub enum SourceFailure {
    #[error("network request failed")]
    Network(#[source] reqwest::Error),
    #[error("HTTP request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("failed to read file")]
    Io(#[source] std::io::Error),
    #[error("content is not parseable as delimited text")]
    Csv(#[source] PolarsError),
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Source unavailable: {origin}")]
    SourceUnavailable {
        origin: String,
        #[source]
        cause: SourceFailure,
    },
    #[error("Dataset from {origin} does not match the declared schema")]
    Schema {
        origin: String,
        #[source]
        cause: SchemaError,
    },
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

/// Where the raw dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Url(String),
    File(PathBuf),
}

impl DataSource {
    /// `http://` and `https://` locations are URLs, anything else is a path.
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DataSource::Url(location.to_string())
        } else {
            DataSource::File(PathBuf::from(location))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => write!(f, "{}", url),
            DataSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Loads the whole dataset into memory in one call. No retry, no caching.
pub struct DataLoader {
    client: Client,
    schema: DatasetSchema,
}

impl DataLoader {
    pub fn new(timeout: Duration, schema: DatasetSchema) -> Result<Self, LoaderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LoaderError::ClientBuild)?;
        Ok(Self { client, schema })
    }

    /// Fetch, parse and validate the dataset.
    ///
    /// Every column is read as text; typing happens in the cleaner from the
    /// declared schema.
    pub fn load(&self, source: &DataSource) -> Result<DataFrame, LoaderError> {
        let unavailable = |cause: SourceFailure| LoaderError::SourceUnavailable {
            origin: source.to_string(),
            cause,
        };

        let bytes = match source {
            DataSource::Url(url) => self.download(url).map_err(unavailable)?,
            DataSource::File(path) => {
                info!("Reading dataset from {}", path.display());
                std::fs::read(path)
                    .map_err(SourceFailure::Io)
                    .map_err(unavailable)?
            }
        };

        let df = Self::parse_csv(bytes)
            .map_err(SourceFailure::Csv)
            .map_err(unavailable)?;

        self.schema
            .validate(&df)
            .map_err(|cause| LoaderError::Schema {
                origin: source.to_string(),
                cause,
            })?;

        info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            source
        );
        Ok(df)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, SourceFailure> {
        info!("Downloading dataset from {}", url);

        let response = self.client.get(url).send().map_err(|e| {
            warn!("Request to {} failed: {:?}", url, e);
            SourceFailure::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP error for {}: {}", url, status);
            return Err(SourceFailure::HttpStatus(status));
        }

        let bytes = response.bytes().map_err(SourceFailure::Network)?;
        info!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }

    /// Parse delimited text with a header row, every column as `String`.
    pub fn parse_csv(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{BORO, OCCUR_DATE};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
INCIDENT_KEY,OCCUR_DATE,OCCUR_TIME,BORO,STATISTICAL_MURDER_FLAG,Latitude
1,01/15/2020,23:45:00,BROOKLYN,true,40.6
2,06/01/2021,01:10:00,QUEENS,false,
";

    fn loader() -> DataLoader {
        DataLoader::new(Duration::from_secs(2), DatasetSchema::nypd_shootings())
            .expect("client builds")
    }

    #[test]
    fn parse_csv_reads_every_column_as_text() -> Result<(), Box<dyn std::error::Error>> {
        let df = DataLoader::parse_csv(SAMPLE.as_bytes().to_vec())?;

        assert_eq!(df.height(), 2);
        for column in df.get_columns() {
            assert_eq!(column.dtype(), &DataType::String, "{}", column.name());
        }
        assert_eq!(df.column(OCCUR_DATE)?.str()?.get(0), Some("01/15/2020"));
        // empty field is missing, not an empty string
        assert_eq!(df.column("Latitude")?.str()?.get(1), None);
        Ok(())
    }

    #[test]
    fn load_from_file_validates_schema() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(SAMPLE.as_bytes())?;
        file.flush()?;

        let df = loader().load(&DataSource::File(file.path().to_path_buf()))?;
        assert_eq!(df.height(), 2);
        assert_eq!(df.column(BORO)?.str()?.get(1), Some("QUEENS"));
        Ok(())
    }

    #[test]
    fn missing_required_column_is_a_schema_error() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"OCCUR_DATE,OCCUR_TIME,STATISTICAL_MURDER_FLAG\n01/15/2020,23:45:00,true\n")?;
        file.flush()?;

        let err = loader()
            .load(&DataSource::File(file.path().to_path_buf()))
            .unwrap_err();
        match err {
            LoaderError::Schema { cause, .. } => {
                assert_eq!(cause, SchemaError::MissingColumn(BORO.to_string()))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = loader()
            .load(&DataSource::File(PathBuf::from("/definitely/not/here.csv")))
            .unwrap_err();
        assert!(matches!(
            err,
            LoaderError::SourceUnavailable {
                cause: SourceFailure::Io(_),
                ..
            }
        ));
    }

    #[test]
    fn unreachable_url_is_source_unavailable() {
        let err = loader()
            .load(&DataSource::Url("http://127.0.0.1:9/rows.csv".to_string()))
            .unwrap_err();
        assert!(matches!(err, LoaderError::SourceUnavailable { .. }));
    }

    #[test]
    fn data_source_parse_distinguishes_urls_and_paths() {
        assert_eq!(
            DataSource::parse("https://example.org/rows.csv"),
            DataSource::Url("https://example.org/rows.csv".to_string())
        );
        assert_eq!(
            DataSource::parse("data/rows.csv"),
            DataSource::File(PathBuf::from("data/rows.csv"))
        );
    }
}
