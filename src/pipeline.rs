//! Linear report run: load, clean, aggregate, fit, render.
//!
//! Each stage takes the previous stage's output and returns a new value; there
//! is no shared working table.

use crate::charts::{ChartError, ChartRenderer};
use crate::config::ReportConfig;
use crate::data::{DataCleaner, DataLoader, DatasetSchema};
use crate::error::PipelineError;
use crate::report::ReportSummary;
use crate::stats::{Aggregator, StatsCalculator, TrendEstimator};
use log::{info, warn};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "summary.json";
pub const MURDER_CHART_FILE: &str = "shootings_by_borough.png";
pub const TREND_CHART_FILE: &str = "yearly_trend.png";
pub const HOUR_CHART_FILE: &str = "hour_density.png";

/// Computed results of a run, before anything is written.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub summary: ReportSummary,
    /// `(hour, density)` points over 0-23
    pub hour_density: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub summary: ReportSummary,
    pub summary_path: PathBuf,
    pub charts: Vec<PathBuf>,
}

pub struct Pipeline {
    config: ReportConfig,
    schema: DatasetSchema,
}

impl Pipeline {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            schema: DatasetSchema::nypd_shootings(),
        }
    }

    /// Run every stage once. Fatal errors abort before any output is written.
    pub fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        self.config.validate()?;

        let source = self.config.data_source();
        let loader = DataLoader::new(self.config.fetch_timeout(), self.schema.clone())?;
        let raw = loader.load(&source)?;

        let analysis = self.analyze(&raw, &source.to_string())?;
        self.write_outputs(analysis)
    }

    /// Clean, aggregate and fit, without touching the filesystem.
    pub fn analyze(&self, raw: &DataFrame, source: &str) -> Result<Analysis, PipelineError> {
        let cleaned = DataCleaner::new(self.schema.clone()).clean(raw)?;
        let canonical = &cleaned.canonical;

        let murder_by_region = Aggregator::murder_by_region(canonical)?;
        let yearly_by_region = Aggregator::yearly_by_region(canonical)?;
        let hourly_counts = Aggregator::hourly_counts(canonical)?;
        let unknown_counts = Aggregator::unknown_counts(canonical)?;

        let (trend, trend_error) = match TrendEstimator::fit(&yearly_by_region) {
            Ok(fit) => {
                info!(
                    "Fitted trend over {} observations, yearly slope {:.2}",
                    fit.observations,
                    fit.coefficient(TrendEstimator::YEAR)
                        .map(|c| c.estimate)
                        .unwrap_or(f64::NAN)
                );
                (Some(fit), None)
            }
            Err(e) => {
                warn!("Skipping trend: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let hour_stats =
            StatsCalculator::compute_descriptive_stats(&StatsCalculator::expand_hours(&hourly_counts));
        let hour_density = StatsCalculator::hour_density(&hourly_counts);

        let summary = ReportSummary {
            source: source.to_string(),
            raw_rows: raw.height(),
            canonical_rows: canonical.height(),
            quarantine_counts: cleaned
                .quarantine_counts()
                .into_iter()
                .map(|(reason, count)| (reason.to_string(), count))
                .collect(),
            quarantined: cleaned.quarantined,
            murder_by_region,
            yearly_by_region,
            hourly_counts,
            hour_stats,
            unknown_counts,
            trend,
            trend_error,
        };

        Ok(Analysis {
            summary,
            hour_density,
        })
    }

    /// Write `summary.json` and, if enabled, the charts into the output directory.
    pub fn write_outputs(&self, analysis: Analysis) -> Result<PipelineOutcome, PipelineError> {
        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::OutputDir(dir.clone(), e))?;

        let summary_path = dir.join(SUMMARY_FILE);
        let json = analysis.summary.to_json_pretty()?;
        std::fs::write(&summary_path, json)
            .map_err(|e| PipelineError::ReportWrite(summary_path.clone(), e))?;
        info!("Wrote {}", summary_path.display());

        let mut charts = Vec::new();
        if self.config.render_charts {
            let renderer = ChartRenderer::new(self.config.chart_width, self.config.chart_height);
            let summary = &analysis.summary;

            let path = dir.join(MURDER_CHART_FILE);
            Self::keep_chart(
                renderer.render_murder_by_region(&summary.murder_by_region, &path),
                &path,
                &mut charts,
            )?;

            let path = dir.join(TREND_CHART_FILE);
            Self::keep_chart(
                renderer.render_yearly_trend(&summary.yearly_by_region, summary.trend.as_ref(), &path),
                &path,
                &mut charts,
            )?;

            let path = dir.join(HOUR_CHART_FILE);
            Self::keep_chart(
                renderer.render_hour_density(&analysis.hour_density, &path),
                &path,
                &mut charts,
            )?;
        }

        Ok(PipelineOutcome {
            summary: analysis.summary,
            summary_path,
            charts,
        })
    }

    fn keep_chart(
        result: Result<(), ChartError>,
        path: &Path,
        charts: &mut Vec<PathBuf>,
    ) -> Result<(), PipelineError> {
        match result {
            Ok(()) => {
                info!("Wrote {}", path.display());
                charts.push(path.to_path_buf());
                Ok(())
            }
            Err(ChartError::NoData(name)) => {
                warn!("Skipping {} chart: no data", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
