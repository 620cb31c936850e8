//! Trend Estimator Module
//! Ordinary least squares fit of `count ~ year + region`.

use crate::stats::YearlyRegionCount;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::collections::BTreeSet;
use thiserror::Error;

/// Relative pivot size below which the design matrix is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrendError {
    #[error("Insufficient data: {observations} observations for {parameters} parameters")]
    InsufficientData {
        observations: usize,
        parameters: usize,
    },
    #[error("Design matrix is singular; year and region do not vary enough to fit a trend")]
    SingularDesign,
}

/// One fitted coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    /// `None` when the fit has no residual degrees of freedom
    pub std_error: Option<f64>,
    pub t_value: Option<f64>,
    pub p_value: Option<f64>,
}

/// Fitted line for one region: shared slope, region-specific intercept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionTrend {
    pub region: String,
    pub intercept: f64,
    pub slope: f64,
}

impl RegionTrend {
    pub fn predict(&self, year: f64) -> f64 {
        self.intercept + self.slope * year
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendFit {
    /// Region absorbed into the intercept
    pub reference_region: String,
    pub coefficients: Vec<Coefficient>,
    pub region_trends: Vec<RegionTrend>,
    pub observations: usize,
    pub df_residual: usize,
    pub r_squared: Option<f64>,
    pub adj_r_squared: Option<f64>,
    pub residual_std_error: Option<f64>,
    pub f_statistic: Option<f64>,
    pub f_p_value: Option<f64>,
}

impl TrendFit {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn region_trend(&self, region: &str) -> Option<&RegionTrend> {
        self.region_trends.iter().find(|t| t.region == region)
    }
}

pub struct TrendEstimator;

impl TrendEstimator {
    pub const INTERCEPT: &'static str = "(Intercept)";
    pub const YEAR: &'static str = "year";

    pub fn region_coefficient_name(region: &str) -> String {
        format!("region: {}", region)
    }

    /// Fit `count ~ year + region`.
    ///
    /// Year is continuous; region is categorical with the alphabetically first
    /// region as reference.
    pub fn fit(data: &[YearlyRegionCount]) -> Result<TrendFit, TrendError> {
        let regions: Vec<&str> = data
            .iter()
            .map(|d| d.region.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let n = data.len();
        let p = 1 + regions.len().max(1);
        if n < p || regions.is_empty() {
            return Err(TrendError::InsufficientData {
                observations: n,
                parameters: p,
            });
        }

        // year is centred so the normal equations stay well conditioned
        let mean_year = data.iter().map(|d| d.year as f64).sum::<f64>() / n as f64;
        let design: Vec<Vec<f64>> = data
            .iter()
            .map(|d| {
                let mut row = Vec::with_capacity(p);
                row.push(1.0);
                row.push(d.year as f64 - mean_year);
                for region in &regions[1..] {
                    row.push(if d.region == *region { 1.0 } else { 0.0 });
                }
                row
            })
            .collect();
        let y: Vec<f64> = data.iter().map(|d| d.count as f64).collect();

        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for (row, &target) in design.iter().zip(&y) {
            for i in 0..p {
                xty[i] += row[i] * target;
                for j in 0..p {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }

        let inverse = Self::invert(xtx).ok_or(TrendError::SingularDesign)?;
        let beta: Vec<f64> = (0..p)
            .map(|i| (0..p).map(|j| inverse[i][j] * xty[j]).sum())
            .collect();

        let mean_y = y.iter().sum::<f64>() / n as f64;
        let mut sse = 0.0;
        let mut sst = 0.0;
        for (row, &target) in design.iter().zip(&y) {
            let fitted: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
            sse += (target - fitted).powi(2);
            sst += (target - mean_y).powi(2);
        }

        let df_residual = n - p;
        let sigma2 = (df_residual > 0).then(|| sse / df_residual as f64);

        // move the intercept from the centred year back to year 0
        let intercept = beta[0] - mean_year * beta[1];
        let intercept_var = sigma2.map(|s2| {
            s2 * (inverse[0][0] + mean_year * mean_year * inverse[1][1]
                - 2.0 * mean_year * inverse[0][1])
        });

        let mut coefficients = vec![
            Self::coefficient(Self::INTERCEPT, intercept, intercept_var, df_residual),
            Self::coefficient(
                Self::YEAR,
                beta[1],
                sigma2.map(|s2| s2 * inverse[1][1]),
                df_residual,
            ),
        ];
        for (offset, region) in regions[1..].iter().enumerate() {
            let idx = offset + 2;
            coefficients.push(Self::coefficient(
                &Self::region_coefficient_name(region),
                beta[idx],
                sigma2.map(|s2| s2 * inverse[idx][idx]),
                df_residual,
            ));
        }

        let region_trends = regions
            .iter()
            .enumerate()
            .map(|(idx, region)| RegionTrend {
                region: region.to_string(),
                intercept: if idx == 0 {
                    intercept
                } else {
                    intercept + beta[idx + 1]
                },
                slope: beta[1],
            })
            .collect();

        let r_squared = (sst > 0.0).then(|| 1.0 - sse / sst);
        let adj_r_squared = r_squared
            .filter(|_| df_residual > 0)
            .map(|r2| 1.0 - (1.0 - r2) * (n - 1) as f64 / df_residual as f64);

        let (f_statistic, f_p_value) = if p > 1 && df_residual > 0 && sse > 0.0 {
            let df_model = (p - 1) as f64;
            let f = ((sst - sse) / df_model) / (sse / df_residual as f64);
            let p_value = FisherSnedecor::new(df_model, df_residual as f64)
                .ok()
                .map(|dist| 1.0 - dist.cdf(f));
            (Some(f), p_value)
        } else {
            (None, None)
        };

        Ok(TrendFit {
            reference_region: regions[0].to_string(),
            coefficients,
            region_trends,
            observations: n,
            df_residual,
            r_squared,
            adj_r_squared,
            residual_std_error: sigma2.map(f64::sqrt),
            f_statistic,
            f_p_value,
        })
    }

    fn coefficient(name: &str, estimate: f64, variance: Option<f64>, df: usize) -> Coefficient {
        let std_error = variance.map(|v| v.max(0.0).sqrt());
        let t_value = std_error.filter(|se| *se > 0.0).map(|se| estimate / se);

        // Two-tailed p-value using t-distribution
        let p_value = t_value.and_then(|t| {
            StudentsT::new(0.0, 1.0, df as f64)
                .ok()
                .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
        });

        Coefficient {
            name: name.to_string(),
            estimate,
            std_error,
            t_value,
            p_value,
        }
    }

    /// Gauss-Jordan inverse with partial pivoting. `None` if singular.
    fn invert(mut a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
        let n = a.len();
        let scale = a
            .iter()
            .enumerate()
            .map(|(i, row)| row[i].abs())
            .fold(0.0, f64::max)
            .max(1.0);
        let mut inv: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();

        for col in 0..n {
            let pivot = (col..n).max_by(|&x, &y| {
                a[x][col]
                    .abs()
                    .partial_cmp(&a[y][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
            if a[pivot][col].abs() <= SINGULAR_TOLERANCE * scale {
                return None;
            }
            a.swap(col, pivot);
            inv.swap(col, pivot);

            let diag = a[col][col];
            for j in 0..n {
                a[col][j] /= diag;
                inv[col][j] /= diag;
            }

            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = a[row][col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    a[row][j] -= factor * a[col][j];
                    inv[row][j] -= factor * inv[col][j];
                }
            }
        }

        Some(inv)
    }
}
