//! Shooting Insights - NYPD Shooting Incident Data Report
//!
//! Usage: `shooting-insights [CONFIG.json]`. Without a config file the public
//! Open Data export is downloaded and the report is written to `./report`.

use anyhow::Context;
use env_logger::Env;
use shooting_insights::report::TextReport;
use shooting_insights::{Pipeline, ReportConfig};
use std::path::Path;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => ReportConfig::from_file(Path::new(&path))
            .with_context(|| format!("could not load config from {}", path))?,
        None => ReportConfig::default(),
    };

    let outcome = Pipeline::new(config)
        .run()
        .context("report run failed")?;

    let text = TextReport::render(&outcome.summary).context("could not format report")?;
    println!("{}", text);
    println!("Summary written to {}", outcome.summary_path.display());
    for chart in &outcome.charts {
        println!("Chart written to {}", chart.display());
    }
    Ok(())
}
