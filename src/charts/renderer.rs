//! Static Chart Renderer
//! Writes report charts as PNG images with plotters.
//!
//! Charts:
//! 1. Shootings by borough, stacked by murder flag, with percentage labels
//! 2. Yearly counts by borough with the fitted trend lines
//! 3. Density of incidents by hour of day (0-23)

use crate::stats::{RegionMurderShare, TrendFit, YearlyRegionCount};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FONT: &str = "sans-serif";

// Colors
const BLUE: RGBColor = RGBColor(91, 155, 213); // Not murder
const RED: RGBColor = RGBColor(237, 125, 49); // Murder

const PALETTE: [RGBColor; 6] = [
    RGBColor(91, 155, 213),  // Blue
    RGBColor(237, 125, 49),  // Orange
    RGBColor(112, 173, 71),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(26, 188, 156),  // Teal
    RGBColor(121, 85, 72),   // Brown
];

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Nothing to plot for the {0} chart")]
    NoData(&'static str),
    #[error("Failed to draw chart '{path}': {message}")]
    Drawing { path: PathBuf, message: String },
}

/// Renders the report charts at a fixed pixel size.
pub struct ChartRenderer {
    width: u32,
    height: u32,
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Stacked bar of incidents per region, coloured by murder flag.
    pub fn render_murder_by_region(
        &self,
        shares: &[RegionMurderShare],
        path: &Path,
    ) -> Result<(), ChartError> {
        if shares.is_empty() {
            return Err(ChartError::NoData("murder-by-region"));
        }
        self.draw_murder_by_region(shares, path)
            .map_err(|e| Self::drawing_error(path, e))
    }

    /// Scatter of yearly counts per region, with fitted lines when a trend is given.
    pub fn render_yearly_trend(
        &self,
        yearly: &[YearlyRegionCount],
        trend: Option<&TrendFit>,
        path: &Path,
    ) -> Result<(), ChartError> {
        if yearly.is_empty() {
            return Err(ChartError::NoData("yearly trend"));
        }
        self.draw_yearly_trend(yearly, trend, path)
            .map_err(|e| Self::drawing_error(path, e))
    }

    /// Density curve of incidents by hour of day.
    pub fn render_hour_density(&self, curve: &[(f64, f64)], path: &Path) -> Result<(), ChartError> {
        if curve.is_empty() {
            return Err(ChartError::NoData("hour-of-day density"));
        }
        self.draw_hour_density(curve, path)
            .map_err(|e| Self::drawing_error(path, e))
    }

    fn drawing_error(path: &Path, e: Box<dyn std::error::Error>) -> ChartError {
        ChartError::Drawing {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }

    fn draw_murder_by_region(
        &self,
        shares: &[RegionMurderShare],
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let regions: Vec<&str> = shares
            .iter()
            .map(|s| s.region.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index_of = |region: &str| regions.iter().position(|r| *r == region).unwrap_or(0) as u32;

        // non-murder bars sit at the bottom of each stack
        let base_of = |share: &RegionMurderShare| -> f64 {
            if !share.murder {
                return 0.0;
            }
            shares
                .iter()
                .filter(|s| s.region == share.region && !s.murder)
                .map(|s| s.count as f64)
                .sum()
        };
        let y_max = regions
            .iter()
            .map(|region| {
                shares
                    .iter()
                    .filter(|s| s.region == *region)
                    .map(|s| s.count as f64)
                    .sum::<f64>()
            })
            .fold(0.0, f64::max)
            * 1.1;

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Shootings by Borough", (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((0u32..regions.len() as u32).into_segmented(), 0f64..y_max.max(1.0))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(regions.len())
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => regions
                    .get(*i as usize)
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .x_desc("Borough")
            .y_desc("Shootings")
            .draw()?;

        for (murder, color, label) in [(false, BLUE, "Not murder"), (true, RED, "Murder")] {
            chart
                .draw_series(shares.iter().filter(|s| s.murder == murder).map(|s| {
                    let i = index_of(&s.region);
                    let base = base_of(s);
                    let mut bar = Rectangle::new(
                        [
                            (SegmentValue::Exact(i), base),
                            (SegmentValue::Exact(i + 1), base + s.count as f64),
                        ],
                        color.filled(),
                    );
                    bar.set_margin(0, 0, 12, 12);
                    bar
                }))?
                .label(label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        let label_style = TextStyle::from((FONT, 14).into_font())
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        chart.draw_series(shares.iter().map(|s| {
            Text::new(
                format!("{:.1}%", s.percent),
                (
                    SegmentValue::CenterOf(index_of(&s.region)),
                    base_of(s) + s.count as f64 / 2.0,
                ),
                label_style.clone(),
            )
        }))?;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    fn draw_yearly_trend(
        &self,
        yearly: &[YearlyRegionCount],
        trend: Option<&TrendFit>,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let regions: Vec<&str> = yearly
            .iter()
            .map(|y| y.region.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let min_year = yearly.iter().map(|y| y.year).min().unwrap_or_default();
        let max_year = yearly.iter().map(|y| y.year).max().unwrap_or_default();

        let line_peak = trend
            .map(|t| {
                t.region_trends
                    .iter()
                    .flat_map(|line| [line.predict(min_year as f64), line.predict(max_year as f64)])
                    .fold(0.0, f64::max)
            })
            .unwrap_or(0.0);
        let count_peak = yearly.iter().map(|y| y.count as f64).fold(0.0, f64::max);
        let y_max = count_peak.max(line_peak).max(1.0) * 1.1;

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Yearly Shootings by Borough", (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(
                (min_year as f64 - 0.5)..(max_year as f64 + 0.5),
                0f64..y_max,
            )?;

        chart
            .configure_mesh()
            .x_label_formatter(&|x| format!("{:.0}", x))
            .x_desc("Year")
            .y_desc("Shootings")
            .draw()?;

        for (idx, region) in regions.iter().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];

            chart
                .draw_series(
                    yearly
                        .iter()
                        .filter(|y| y.region == *region)
                        .map(|y| Circle::new((y.year as f64, y.count as f64), 4, color.filled())),
                )?
                .label(*region)
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));

            if let Some(line) = trend.and_then(|t| t.region_trend(region)) {
                chart.draw_series(LineSeries::new(
                    [min_year, max_year].map(|year| (year as f64, line.predict(year as f64))),
                    color.stroke_width(2),
                ))?;
            }
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    fn draw_hour_density(
        &self,
        curve: &[(f64, f64)],
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let peak = curve.iter().map(|(_, d)| *d).fold(0.0, f64::max);

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Shootings by Hour of Day", (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..23f64, 0f64..(peak * 1.1).max(f64::EPSILON))?;

        chart
            .configure_mesh()
            .x_labels(24)
            .x_label_formatter(&|x| format!("{:.0}", x))
            .y_label_formatter(&|y| format!("{:.3}", y))
            .x_desc("Hour")
            .y_desc("Density")
            .draw()?;

        chart.draw_series(
            AreaSeries::new(curve.iter().copied(), 0.0, BLUE.mix(0.25)).border_style(BLUE.stroke_width(2)),
        )?;

        root.present()?;
        Ok(())
    }
}
