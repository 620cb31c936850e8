//! Data Processor Module
//! Turns raw incident rows into the canonical table: typed timestamp and flag,
//! coordinate columns dropped, missing text replaced with `UNKNOWN`.

use crate::data::schema::{
    ColumnKind, DatasetSchema, SchemaError, BORO, NULL_SENTINEL, OCCUR_DATE, OCCUR_DATETIME, OCCUR_TIME,
    REPORT_TZ, STATISTICAL_MURDER_FLAG, UNKNOWN,
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Required column '{0}' not found")]
    MissingColumn(String),
    #[error("Table already has a combined timestamp column; it has been cleaned before")]
    AlreadyCanonical,
    #[error("Canonical timestamp at row {0} cannot be placed in the report time zone")]
    CorruptTimestamp(usize),
}

/// Why a raw row was set aside instead of entering the canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum QuarantineReason {
    MalformedDate,
    MalformedTime,
    /// Wall-clock time skipped by a daylight-saving transition.
    NonexistentLocalTime,
    MalformedFlag,
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuarantineReason::MalformedDate => "malformed date",
            QuarantineReason::MalformedTime => "malformed time",
            QuarantineReason::NonexistentLocalTime => "nonexistent local time",
            QuarantineReason::MalformedFlag => "malformed murder flag",
        };
        f.write_str(label)
    }
}

/// A raw row that failed a parsing contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantinedRow {
    /// 0-based row index in the raw table
    pub row: usize,
    pub reason: QuarantineReason,
    pub date_text: Option<String>,
    pub time_text: Option<String>,
}

/// Cleaned, fully-typed row ready for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub timestamp: DateTime<Tz>,
    pub region: String,
    pub murder: bool,
    /// Every other text column, keyed by column name
    pub fields: BTreeMap<String, String>,
}

impl CanonicalRecord {
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }
}

/// Result of one cleaning pass.
#[derive(Debug, Clone)]
pub struct CleanOutput {
    pub canonical: DataFrame,
    pub quarantined: Vec<QuarantinedRow>,
}

impl CleanOutput {
    /// Quarantined rows grouped by reason.
    pub fn quarantine_counts(&self) -> BTreeMap<QuarantineReason, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.quarantined {
            *counts.entry(row.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Typed view of the canonical table.
    pub fn records(&self) -> Result<Vec<CanonicalRecord>, CleanError> {
        let df = &self.canonical;

        let timestamps = df.column(OCCUR_DATETIME)?.cast(&DataType::Int64)?;
        let timestamps = timestamps.i64()?;
        let regions = df.column(BORO)?.str()?;
        let flags = df.column(STATISTICAL_MURDER_FLAG)?.bool()?;

        let text_columns: Vec<&Column> = df
            .get_columns()
            .iter()
            .filter(|c| {
                let name = c.name().as_str();
                name != OCCUR_DATETIME && name != BORO && name != STATISTICAL_MURDER_FLAG
            })
            .collect();

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let timestamp = timestamps
                .get(i)
                .and_then(DateTime::from_timestamp_millis)
                .and_then(|utc| REPORT_TZ.from_local_datetime(&utc.naive_utc()).earliest())
                .ok_or(CleanError::CorruptTimestamp(i))?;

            let mut fields = BTreeMap::new();
            for column in &text_columns {
                let value = column.str()?.get(i).unwrap_or(UNKNOWN);
                fields.insert(column.name().to_string(), value.to_string());
            }

            records.push(CanonicalRecord {
                timestamp,
                region: regions.get(i).unwrap_or(UNKNOWN).to_string(),
                murder: flags.get(i).unwrap_or(false),
                fields,
            });
        }

        Ok(records)
    }
}

/// Parsed date/time/flag of a row that passed every contract.
struct ParsedRow {
    local: NaiveDateTime,
    murder: bool,
}

/// Applies the fixed cleaning sequence to a raw table.
pub struct DataCleaner {
    schema: DatasetSchema,
}

impl Default for DataCleaner {
    fn default() -> Self {
        Self::new(DatasetSchema::nypd_shootings())
    }
}

impl DataCleaner {
    pub fn new(schema: DatasetSchema) -> Self {
        Self { schema }
    }

    /// Build the canonical table from raw rows.
    ///
    /// Rows whose date, time or flag cannot be parsed are returned in
    /// `quarantined`, never dropped silently. Cleaning an already canonical
    /// table fails with [`CleanError::AlreadyCanonical`].
    pub fn clean(&self, raw: &DataFrame) -> Result<CleanOutput, CleanError> {
        if raw
            .get_column_names()
            .iter()
            .any(|name| name.as_str() == OCCUR_DATETIME)
        {
            return Err(CleanError::AlreadyCanonical);
        }
        self.schema.validate(raw).map_err(|e| match e {
            SchemaError::MissingColumn(name) => CleanError::MissingColumn(name),
        })?;

        let dates = Self::text_column(raw, OCCUR_DATE)?;
        let times = Self::text_column(raw, OCCUR_TIME)?;
        let flags = Self::text_column(raw, STATISTICAL_MURDER_FLAG)?;
        let dates = dates.str()?;
        let times = times.str()?;
        let flags = flags.str()?;

        let mut keep = Vec::with_capacity(raw.height());
        let mut parsed = Vec::with_capacity(raw.height());
        let mut quarantined = Vec::new();

        for i in 0..raw.height() {
            let date_text = dates.get(i);
            let time_text = times.get(i);

            match Self::parse_row(date_text, time_text, flags.get(i)) {
                Ok(row) => {
                    keep.push(true);
                    parsed.push(row);
                }
                Err(reason) => {
                    keep.push(false);
                    quarantined.push(QuarantinedRow {
                        row: i,
                        reason,
                        date_text: date_text.map(str::to_string),
                        time_text: time_text.map(str::to_string),
                    });
                }
            }
        }

        if !quarantined.is_empty() {
            warn!(
                "Quarantined {} of {} rows with unparseable date, time or flag",
                quarantined.len(),
                raw.height()
            );
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let kept = raw.filter(&mask)?;

        let mut columns: Vec<Column> = Vec::with_capacity(kept.width());
        for column in kept.get_columns() {
            let name = column.name().as_str();
            match self.schema.kind_of(name) {
                ColumnKind::Coordinate => {}
                ColumnKind::Date if name == OCCUR_DATE => {
                    columns.push(Self::timestamp_column(&parsed));
                }
                ColumnKind::Time if name == OCCUR_TIME => {}
                ColumnKind::Flag if name == STATISTICAL_MURDER_FLAG => {
                    let values: Vec<bool> = parsed.iter().map(|row| row.murder).collect();
                    columns.push(Column::new(column.name().clone(), values));
                }
                _ => columns.push(Self::normalize_text_column(column)?),
            }
        }

        let canonical = DataFrame::new(columns)?;
        info!(
            "Cleaned {} rows into {} canonical rows x {} columns",
            raw.height(),
            canonical.height(),
            canonical.width()
        );

        Ok(CleanOutput {
            canonical,
            quarantined,
        })
    }

    /// Column coerced to text; a missing required column is an error.
    fn text_column(df: &DataFrame, name: &str) -> Result<Column, CleanError> {
        let column = df
            .column(name)
            .map_err(|_| CleanError::MissingColumn(name.to_string()))?;
        Ok(column.cast(&DataType::String)?)
    }

    fn parse_row(
        date_text: Option<&str>,
        time_text: Option<&str>,
        flag_text: Option<&str>,
    ) -> Result<ParsedRow, QuarantineReason> {
        let date = parse_date(date_text).ok_or(QuarantineReason::MalformedDate)?;
        let time = parse_time(time_text).ok_or(QuarantineReason::MalformedTime)?;
        let local = date.and_time(time);

        // ambiguous fall-back times resolve to the earlier instant
        REPORT_TZ
            .from_local_datetime(&local)
            .earliest()
            .ok_or(QuarantineReason::NonexistentLocalTime)?;

        let murder = parse_flag(flag_text).ok_or(QuarantineReason::MalformedFlag)?;
        Ok(ParsedRow { local, murder })
    }

    /// Eastern wall-clock timestamps, millisecond precision, no zone attached.
    fn timestamp_column(parsed: &[ParsedRow]) -> Column {
        let series = DatetimeChunked::from_naive_datetime(
            OCCUR_DATETIME.into(),
            parsed.iter().map(|row| row.local),
            TimeUnit::Milliseconds,
        )
        .into_series();
        Column::from(series)
    }

    fn normalize_text_column(column: &Column) -> Result<Column, CleanError> {
        let as_text = column.cast(&DataType::String)?;
        let values: Vec<String> = as_text
            .str()?
            .into_iter()
            .map(|value| match present(value) {
                Some(text) => text.to_string(),
                None => UNKNOWN.to_string(),
            })
            .collect();
        Ok(Column::new(column.name().clone(), values))
    }
}

/// Trimmed text, or `None` when missing, blank or the null sentinel.
fn present(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed == NULL_SENTINEL {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_date(text: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(present(text)?, "%m/%d/%Y").ok()
}

fn parse_time(text: Option<&str>) -> Option<NaiveTime> {
    let text = present(text)?;
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
        // leap seconds roll over into the next minute once stored
        .filter(|time| time.nanosecond() < 1_000_000_000)
}

fn parse_flag(text: Option<&str>) -> Option<bool> {
    match present(text)?.to_ascii_lowercase().as_str() {
        "true" | "t" | "y" | "yes" | "1" => Some(true),
        "false" | "f" | "n" | "no" | "0" => Some(false),
        _ => None,
    }
}
