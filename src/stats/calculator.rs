//! Statistics Calculator Module
//! Descriptive statistics and kernel density estimates for time-of-day charts.

use crate::stats::HourCount;
use serde::Serialize;
use std::f64::consts::PI;

/// Grid resolution for the hour-of-day density curve.
pub const DENSITY_STEP: f64 = 0.1;

/// Descriptive statistics for a sample.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub p25: f64,
    pub p75: f64,
}

impl Default for DescriptiveStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            p25: f64::NAN,
            p75: f64::NAN,
        }
    }
}

impl DescriptiveStats {
    pub fn iqr(&self) -> f64 {
        self.p75 - self.p25
    }
}

pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
        let n = values.len();
        if n == 0 {
            return DescriptiveStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = values.iter().sum::<f64>() / n as f64;
        let median = Self::percentile(&sorted, 50.0);

        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        DescriptiveStats {
            count: n,
            mean,
            median,
            std: variance.sqrt(),
            variance,
            p25: Self::percentile(&sorted, 25.0),
            p75: Self::percentile(&sorted, 75.0),
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Silverman's rule-of-thumb bandwidth, `0.9 * min(sd, IQR / 1.34) * n^(-1/5)`.
    ///
    /// Falls back to the standard deviation, then `|x0|`, then 1 when the spread is zero.
    pub fn silverman_bandwidth(values: &[f64]) -> f64 {
        let stats = Self::compute_descriptive_stats(values);
        if stats.count < 2 {
            return 1.0;
        }

        let mut lo = stats.std.min(stats.iqr() / 1.34);
        if lo <= 0.0 {
            lo = stats.std;
        }
        if lo <= 0.0 {
            lo = values[0].abs();
        }
        if lo <= 0.0 {
            lo = 1.0;
        }
        0.9 * lo * (stats.count as f64).powf(-0.2)
    }

    /// Gaussian kernel density of `values` evaluated at each grid point.
    pub fn gaussian_kde(values: &[f64], bandwidth: f64, grid: &[f64]) -> Vec<f64> {
        if values.is_empty() || bandwidth <= 0.0 {
            return vec![0.0; grid.len()];
        }

        let norm = 1.0 / (values.len() as f64 * bandwidth * (2.0 * PI).sqrt());
        grid.iter()
            .map(|&x| {
                let sum: f64 = values
                    .iter()
                    .map(|&v| {
                        let z = (x - v) / bandwidth;
                        (-0.5 * z * z).exp()
                    })
                    .sum();
                sum * norm
            })
            .collect()
    }

    /// One value per incident from per-hour counts.
    pub fn expand_hours(hourly: &[HourCount]) -> Vec<f64> {
        hourly
            .iter()
            .flat_map(|h| std::iter::repeat(h.hour as f64).take(h.count as usize))
            .collect()
    }

    /// Density of incidents by hour of day over the domain 0-23.
    ///
    /// Returns `(hour, density)` points spaced [`DENSITY_STEP`] apart.
    pub fn hour_density(hourly: &[HourCount]) -> Vec<(f64, f64)> {
        let values = Self::expand_hours(hourly);
        if values.is_empty() {
            return Vec::new();
        }

        let bandwidth = Self::silverman_bandwidth(&values);
        let steps = (23.0 / DENSITY_STEP).round() as usize;
        let grid: Vec<f64> = (0..=steps).map(|i| i as f64 * DENSITY_STEP).collect();
        let density = Self::gaussian_kde(&values, bandwidth, &grid);

        grid.into_iter().zip(density).collect()
    }
}
