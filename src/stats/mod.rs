//! Stats module - grouped aggregation, descriptive statistics and trend fitting

mod aggregator;
mod calculator;
mod trend;

pub use aggregator::{
    AggregateError, Aggregator, ColumnCompleteness, HourCount, RegionMurderShare,
    YearlyRegionCount,
};
pub use calculator::{DescriptiveStats, StatsCalculator};
pub use trend::{Coefficient, RegionTrend, TrendError, TrendEstimator, TrendFit};
