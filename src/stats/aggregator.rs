//! Aggregator Module
//! Grouped counts over the canonical table.

use crate::data::schema::{BORO, OCCUR_DATETIME, STATISTICAL_MURDER_FLAG, UNKNOWN};
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;

const COUNT: &str = "count";
const PERCENT: &str = "percent";
const YEAR: &str = "year";
const HOUR: &str = "hour";

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Unexpected null in aggregated column '{0}'")]
    UnexpectedNull(&'static str),
}

/// (region, murder flag) -> count, with share of the region total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionMurderShare {
    pub region: String,
    pub murder: bool,
    pub count: u64,
    /// 0-100
    pub percent: f64,
}

/// (year, region) -> count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlyRegionCount {
    pub year: i32,
    pub region: String,
    pub count: u64,
}

/// Incidents per hour of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: u64,
}

/// How many values of a text column are `UNKNOWN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCompleteness {
    pub column: String,
    pub unknown: usize,
    pub total: usize,
}

/// Pure grouped aggregations. Empty groups are absent from every output.
pub struct Aggregator;

impl Aggregator {
    /// Group by region and murder flag, with each group's share of its region.
    ///
    /// Sorted by region, then flag (`false` first).
    pub fn murder_by_region(canonical: &DataFrame) -> Result<Vec<RegionMurderShare>, AggregateError> {
        let grouped = canonical
            .clone()
            .lazy()
            .group_by([col(BORO), col(STATISTICAL_MURDER_FLAG)])
            .agg([len().cast(DataType::UInt64).alias(COUNT)])
            .with_column(
                (col(COUNT).cast(DataType::Float64) * lit(100.0)
                    / col(COUNT)
                        .cast(DataType::Float64)
                        .sum()
                        .over([col(BORO)]))
                .alias(PERCENT),
            )
            .sort_by_exprs(
                [col(BORO), col(STATISTICAL_MURDER_FLAG)],
                SortMultipleOptions::default(),
            )
            .collect()?;

        let regions = grouped.column(BORO)?.str()?;
        let flags = grouped.column(STATISTICAL_MURDER_FLAG)?.bool()?;
        let counts = grouped.column(COUNT)?.u64()?;
        let percents = grouped.column(PERCENT)?.f64()?;

        let mut rows = Vec::with_capacity(grouped.height());
        for i in 0..grouped.height() {
            rows.push(RegionMurderShare {
                region: regions
                    .get(i)
                    .ok_or(AggregateError::UnexpectedNull(BORO))?
                    .to_string(),
                murder: flags
                    .get(i)
                    .ok_or(AggregateError::UnexpectedNull(STATISTICAL_MURDER_FLAG))?,
                count: counts.get(i).ok_or(AggregateError::UnexpectedNull(COUNT))?,
                percent: percents
                    .get(i)
                    .ok_or(AggregateError::UnexpectedNull(PERCENT))?,
            });
        }
        Ok(rows)
    }

    /// Year from the canonical timestamp, grouped with region. Sorted by year, region.
    pub fn yearly_by_region(canonical: &DataFrame) -> Result<Vec<YearlyRegionCount>, AggregateError> {
        let grouped = canonical
            .clone()
            .lazy()
            .with_column(col(OCCUR_DATETIME).dt().year().alias(YEAR))
            .group_by([col(YEAR), col(BORO)])
            .agg([len().cast(DataType::UInt64).alias(COUNT)])
            .sort_by_exprs([col(YEAR), col(BORO)], SortMultipleOptions::default())
            .collect()?;

        let years = grouped.column(YEAR)?.cast(&DataType::Int32)?;
        let years = years.i32()?;
        let regions = grouped.column(BORO)?.str()?;
        let counts = grouped.column(COUNT)?.u64()?;

        let mut rows = Vec::with_capacity(grouped.height());
        for i in 0..grouped.height() {
            rows.push(YearlyRegionCount {
                year: years.get(i).ok_or(AggregateError::UnexpectedNull(YEAR))?,
                region: regions
                    .get(i)
                    .ok_or(AggregateError::UnexpectedNull(BORO))?
                    .to_string(),
                count: counts.get(i).ok_or(AggregateError::UnexpectedNull(COUNT))?,
            });
        }
        Ok(rows)
    }

    /// Incidents per hour of day (0-23). Hours with no incidents are absent.
    pub fn hourly_counts(canonical: &DataFrame) -> Result<Vec<HourCount>, AggregateError> {
        let grouped = canonical
            .clone()
            .lazy()
            .select([col(OCCUR_DATETIME)
                .dt()
                .hour()
                .cast(DataType::UInt32)
                .alias(HOUR)])
            .group_by([col(HOUR)])
            .agg([len().cast(DataType::UInt64).alias(COUNT)])
            .sort_by_exprs([col(HOUR)], SortMultipleOptions::default())
            .collect()?;

        let hours = grouped.column(HOUR)?.u32()?;
        let counts = grouped.column(COUNT)?.u64()?;

        let mut rows = Vec::with_capacity(grouped.height());
        for i in 0..grouped.height() {
            rows.push(HourCount {
                hour: hours.get(i).ok_or(AggregateError::UnexpectedNull(HOUR))?,
                count: counts.get(i).ok_or(AggregateError::UnexpectedNull(COUNT))?,
            });
        }
        Ok(rows)
    }

    /// `UNKNOWN` tally for every text column, in column order.
    pub fn unknown_counts(canonical: &DataFrame) -> Result<Vec<ColumnCompleteness>, AggregateError> {
        let mut out = Vec::new();
        for column in canonical.get_columns() {
            if column.dtype() != &DataType::String {
                continue;
            }
            let unknown = column
                .str()?
                .into_iter()
                .filter(|value| *value == Some(UNKNOWN))
                .count();
            out.push(ColumnCompleteness {
                column: column.name().to_string(),
                unknown,
                total: column.len(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataCleaner;
    use std::collections::HashMap;

    /// Raw rows for `region`, `murders` of them flagged, spread over hours and years.
    fn push_region(
        rows: &mut Vec<(String, String, String, String)>,
        region: &str,
        murders: usize,
        others: usize,
    ) {
        for i in 0..murders + others {
            let year = 2018 + (i % 3);
            let hour = (i * 7) % 24;
            rows.push((
                format!("06/{:02}/{}", 1 + i % 28, year),
                format!("{:02}:15:00", hour),
                region.to_string(),
                if i < murders { "true" } else { "false" }.to_string(),
            ));
        }
    }

    fn canonical(rows: &[(String, String, String, String)]) -> DataFrame {
        let raw = df!(
            "OCCUR_DATE" => rows.iter().map(|r| r.0.as_str()).collect::<Vec<_>>(),
            "OCCUR_TIME" => rows.iter().map(|r| r.1.as_str()).collect::<Vec<_>>(),
            BORO => rows.iter().map(|r| r.2.as_str()).collect::<Vec<_>>(),
            STATISTICAL_MURDER_FLAG => rows.iter().map(|r| r.3.as_str()).collect::<Vec<_>>()
        )
        .expect("valid frame");
        let output = DataCleaner::default().clean(&raw).expect("clean");
        assert!(output.quarantined.is_empty());
        output.canonical
    }

    fn sample() -> DataFrame {
        let mut rows = Vec::new();
        push_region(&mut rows, "STATEN ISLAND", 2, 8);
        push_region(&mut rows, "BROOKLYN", 7, 14);
        push_region(&mut rows, "BRONX", 3, 0);
        canonical(&rows)
    }

    #[test]
    fn staten_island_murder_share_is_twenty_percent() -> Result<(), Box<dyn std::error::Error>> {
        let shares = Aggregator::murder_by_region(&sample())?;
        let staten_murder = shares
            .iter()
            .find(|s| s.region == "STATEN ISLAND" && s.murder)
            .expect("group present");

        assert_eq!(staten_murder.count, 2);
        assert!((staten_murder.percent - 20.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn region_percentages_sum_to_hundred() -> Result<(), Box<dyn std::error::Error>> {
        let shares = Aggregator::murder_by_region(&sample())?;
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for share in &shares {
            *totals.entry(share.region.as_str()).or_insert(0.0) += share.percent;
        }

        assert_eq!(totals.len(), 3);
        for (region, total) in totals {
            assert!((total - 100.0).abs() < 0.01, "{region}: {total}");
        }
        Ok(())
    }

    #[test]
    fn empty_groups_are_absent_and_output_is_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let shares = Aggregator::murder_by_region(&sample())?;
        let keys: Vec<(&str, bool)> = shares
            .iter()
            .map(|s| (s.region.as_str(), s.murder))
            .collect();

        // BRONX has no non-murder rows
        assert_eq!(
            keys,
            vec![
                ("BRONX", true),
                ("BROOKLYN", false),
                ("BROOKLYN", true),
                ("STATEN ISLAND", false),
                ("STATEN ISLAND", true),
            ]
        );
        Ok(())
    }

    #[test]
    fn grouped_counts_sum_to_row_count() -> Result<(), Box<dyn std::error::Error>> {
        let df = sample();
        let total = df.height() as u64;

        let by_region: u64 = Aggregator::murder_by_region(&df)?.iter().map(|s| s.count).sum();
        let yearly: u64 = Aggregator::yearly_by_region(&df)?.iter().map(|y| y.count).sum();
        let hourly: u64 = Aggregator::hourly_counts(&df)?.iter().map(|h| h.count).sum();

        assert_eq!(by_region, total);
        assert_eq!(yearly, total);
        assert_eq!(hourly, total);
        Ok(())
    }

    #[test]
    fn yearly_counts_follow_timestamp_year() -> Result<(), Box<dyn std::error::Error>> {
        let yearly = Aggregator::yearly_by_region(&sample())?;
        let brooklyn: Vec<(i32, u64)> = yearly
            .iter()
            .filter(|y| y.region == "BROOKLYN")
            .map(|y| (y.year, y.count))
            .collect();

        // 21 rows cycling through 2018, 2019, 2020
        assert_eq!(brooklyn, vec![(2018, 7), (2019, 7), (2020, 7)]);
        assert!(yearly.windows(2).all(|w| (w[0].year, &w[0].region) <= (w[1].year, &w[1].region)));
        Ok(())
    }

    #[test]
    fn hours_lie_in_day_range() -> Result<(), Box<dyn std::error::Error>> {
        let hourly = Aggregator::hourly_counts(&sample())?;
        assert!(!hourly.is_empty());
        assert!(hourly.iter().all(|h| h.hour <= 23 && h.count > 0));
        assert!(hourly.windows(2).all(|w| w[0].hour < w[1].hour));
        Ok(())
    }

    #[test]
    fn unknown_counts_cover_text_columns() -> Result<(), Box<dyn std::error::Error>> {
        let raw = df!(
            "OCCUR_DATE" => &["01/15/2020", "01/16/2020"],
            "OCCUR_TIME" => &["10:00:00", "11:00:00"],
            BORO => &["BRONX", "QUEENS"],
            STATISTICAL_MURDER_FLAG => &["true", "false"],
            "VIC_RACE" => &[Some("(null)"), Some("BLACK")]
        )?;
        let df = DataCleaner::default().clean(&raw)?.canonical;

        let completeness = Aggregator::unknown_counts(&df)?;
        let vic_race = completeness
            .iter()
            .find(|c| c.column == "VIC_RACE")
            .expect("text column reported");
        assert_eq!(vic_race.unknown, 1);
        assert_eq!(vic_race.total, 2);
        assert!(completeness.iter().all(|c| c.column != STATISTICAL_MURDER_FLAG));
        Ok(())
    }
}
