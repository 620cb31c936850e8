//! Dataset Schema Module
//! Declares the expected columns of the incident dataset and how each one is typed.

use chrono_tz::Tz;
use polars::prelude::*;
use thiserror::Error;

pub const OCCUR_DATE: &str = "OCCUR_DATE";
pub const OCCUR_TIME: &str = "OCCUR_TIME";
pub const BORO: &str = "BORO";
pub const STATISTICAL_MURDER_FLAG: &str = "STATISTICAL_MURDER_FLAG";

/// Combined date + time column produced by the cleaner.
pub const OCCUR_DATETIME: &str = "OCCUR_DATETIME";

/// Replacement for missing text values.
pub const UNKNOWN: &str = "UNKNOWN";

/// Literal text the source uses for a missing value.
pub const NULL_SENTINEL: &str = "(null)";

/// Incident timestamps are wall-clock times in New York.
pub const REPORT_TZ: Tz = chrono_tz::America::New_York;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Required column '{0}' not found")]
    MissingColumn(String),
}

/// How a column is interpreted during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `MM/DD/YYYY` calendar date
    Date,
    /// `HH:MM:SS` time of day
    Time,
    /// Boolean-like text
    Flag,
    /// Free text, missing values become `UNKNOWN`
    Text,
    /// Geographic column, dropped during cleaning
    Coordinate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
}

impl ColumnSpec {
    const fn new(name: &'static str, kind: ColumnKind, required: bool) -> Self {
        Self {
            name,
            kind,
            required,
        }
    }
}

/// Explicit name -> kind mapping, declared up front instead of probing values.
///
/// Columns present in the data but not declared here are treated as text.
#[derive(Debug, Clone)]
pub struct DatasetSchema {
    columns: Vec<ColumnSpec>,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::nypd_shootings()
    }
}

impl DatasetSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Column layout of the NYPD Shooting Incident Data (Historic) export.
    pub fn nypd_shootings() -> Self {
        use ColumnKind::*;

        Self::new(vec![
            ColumnSpec::new("INCIDENT_KEY", Text, false),
            ColumnSpec::new(OCCUR_DATE, Date, true),
            ColumnSpec::new(OCCUR_TIME, Time, true),
            ColumnSpec::new(BORO, Text, true),
            ColumnSpec::new("LOC_OF_OCCUR_DESC", Text, false),
            ColumnSpec::new("PRECINCT", Text, false),
            ColumnSpec::new("JURISDICTION_CODE", Text, false),
            ColumnSpec::new("LOC_CLASSFCTN_DESC", Text, false),
            ColumnSpec::new("LOCATION_DESC", Text, false),
            ColumnSpec::new(STATISTICAL_MURDER_FLAG, Flag, true),
            ColumnSpec::new("PERP_AGE_GROUP", Text, false),
            ColumnSpec::new("PERP_SEX", Text, false),
            ColumnSpec::new("PERP_RACE", Text, false),
            ColumnSpec::new("VIC_AGE_GROUP", Text, false),
            ColumnSpec::new("VIC_SEX", Text, false),
            ColumnSpec::new("VIC_RACE", Text, false),
            ColumnSpec::new("X_COORD_CD", Coordinate, false),
            ColumnSpec::new("Y_COORD_CD", Coordinate, false),
            ColumnSpec::new("Latitude", Coordinate, false),
            ColumnSpec::new("Longitude", Coordinate, false),
            ColumnSpec::new("Lon_Lat", Coordinate, false),
        ])
    }

    /// Kind of a column; undeclared columns are text.
    pub fn kind_of(&self, name: &str) -> ColumnKind {
        self.columns
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.kind)
            .unwrap_or(ColumnKind::Text)
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name)
    }

    /// Check that every required column exists in the frame.
    pub fn validate(&self, df: &DataFrame) -> Result<(), SchemaError> {
        let present = df.get_column_names();
        for required in self.required_columns() {
            if !present.iter().any(|name| name.as_str() == required) {
                return Err(SchemaError::MissingColumn(required.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_columns_are_text() {
        let schema = DatasetSchema::nypd_shootings();
        assert_eq!(schema.kind_of("SOME_NEW_COLUMN"), ColumnKind::Text);
        assert_eq!(schema.kind_of("Latitude"), ColumnKind::Coordinate);
        assert_eq!(schema.kind_of(OCCUR_DATE), ColumnKind::Date);
    }

    #[test]
    fn validate_reports_first_missing_column() -> Result<(), Box<dyn std::error::Error>> {
        let schema = DatasetSchema::nypd_shootings();
        let df = df!(
            OCCUR_DATE => &["01/15/2020"],
            OCCUR_TIME => &["23:45:00"],
            STATISTICAL_MURDER_FLAG => &["true"]
        )?;

        assert_eq!(
            schema.validate(&df),
            Err(SchemaError::MissingColumn(BORO.to_string()))
        );
        Ok(())
    }

    #[test]
    fn validate_accepts_extra_columns() -> Result<(), Box<dyn std::error::Error>> {
        let schema = DatasetSchema::nypd_shootings();
        let df = df!(
            OCCUR_DATE => &["01/15/2020"],
            OCCUR_TIME => &["23:45:00"],
            BORO => &["BROOKLYN"],
            STATISTICAL_MURDER_FLAG => &["true"],
            "EXTRA" => &["x"]
        )?;

        assert!(schema.validate(&df).is_ok());
        Ok(())
    }
}
