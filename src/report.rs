//! Report Module
//! Summary of one run, serialisable to JSON and renderable as plain-text tables.

use crate::data::QuarantinedRow;
use crate::stats::{
    ColumnCompleteness, DescriptiveStats, HourCount, RegionMurderShare, TrendFit,
    YearlyRegionCount,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Everything a run computed, in presentation order.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub source: String,
    pub raw_rows: usize,
    pub canonical_rows: usize,
    /// Quarantined row count per reason
    pub quarantine_counts: BTreeMap<String, usize>,
    pub quarantined: Vec<QuarantinedRow>,
    pub murder_by_region: Vec<RegionMurderShare>,
    pub yearly_by_region: Vec<YearlyRegionCount>,
    pub hourly_counts: Vec<HourCount>,
    pub hour_stats: DescriptiveStats,
    pub unknown_counts: Vec<ColumnCompleteness>,
    pub trend: Option<TrendFit>,
    /// Why the trend could not be fitted, if it was not
    pub trend_error: Option<String>,
}

impl ReportSummary {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Plain-text rendering of a [`ReportSummary`].
pub struct TextReport;

impl TextReport {
    pub fn render(summary: &ReportSummary) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        Self::write_all(&mut out, summary)?;
        Ok(out)
    }

    fn write_all(out: &mut String, s: &ReportSummary) -> std::fmt::Result {
        writeln!(out, "NYPD Shooting Incident Report")?;
        writeln!(out, "Source: {}", s.source)?;
        writeln!(
            out,
            "Rows: {} raw, {} canonical, {} quarantined",
            s.raw_rows,
            s.canonical_rows,
            s.quarantined.len()
        )?;
        for (reason, count) in &s.quarantine_counts {
            writeln!(out, "  {:<28} {:>8}", reason, count)?;
        }

        writeln!(out)?;
        writeln!(out, "Shootings by borough and murder flag")?;
        writeln!(out, "{:<16} {:<7} {:>8} {:>8}", "BORO", "MURDER", "COUNT", "PERCENT")?;
        for row in &s.murder_by_region {
            writeln!(
                out,
                "{:<16} {:<7} {:>8} {:>7.1}%",
                row.region, row.murder, row.count, row.percent
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Shootings by year and borough")?;
        writeln!(out, "{:<6} {:<16} {:>8}", "YEAR", "BORO", "COUNT")?;
        for row in &s.yearly_by_region {
            writeln!(out, "{:<6} {:<16} {:>8}", row.year, row.region, row.count)?;
        }

        writeln!(out)?;
        match (&s.trend, &s.trend_error) {
            (Some(fit), _) => Self::write_trend(out, fit)?,
            (None, Some(reason)) => writeln!(out, "Trend not fitted: {}", reason)?,
            (None, None) => writeln!(out, "Trend not fitted")?,
        }

        writeln!(out)?;
        writeln!(out, "Shootings by hour of day")?;
        for row in &s.hourly_counts {
            writeln!(out, "{:>2}:00 {:>8}", row.hour, row.count)?;
        }
        if s.hour_stats.count > 0 {
            writeln!(
                out,
                "mean hour {:.2}, median {:.1}, sd {:.2}",
                s.hour_stats.mean, s.hour_stats.median, s.hour_stats.std
            )?;
        }

        writeln!(out)?;
        writeln!(out, "UNKNOWN values per column")?;
        for row in s.unknown_counts.iter().filter(|c| c.unknown > 0) {
            writeln!(out, "{:<24} {:>8} / {}", row.column, row.unknown, row.total)?;
        }
        Ok(())
    }

    fn write_trend(out: &mut String, fit: &TrendFit) -> std::fmt::Result {
        writeln!(
            out,
            "Linear trend: count ~ year + borough (reference {})",
            fit.reference_region
        )?;
        writeln!(
            out,
            "{:<28} {:>12} {:>10} {:>8} {:>10}",
            "TERM", "ESTIMATE", "STD.ERR", "T", "P"
        )?;
        for c in &fit.coefficients {
            writeln!(
                out,
                "{:<28} {:>12.3} {:>10} {:>8} {:>10}",
                c.name,
                c.estimate,
                optional(c.std_error, 3),
                optional(c.t_value, 2),
                optional(c.p_value, 4)
            )?;
        }
        writeln!(
            out,
            "n = {}, R² = {}, adj. R² = {}, F p-value = {}",
            fit.observations,
            optional(fit.r_squared, 4),
            optional(fit.adj_r_squared, 4),
            optional(fit.f_p_value, 4)
        )
    }
}

fn optional(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}
