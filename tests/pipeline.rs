use shooting_insights::data::schema::{OCCUR_DATE, OCCUR_DATETIME, OCCUR_TIME, UNKNOWN};
use shooting_insights::data::{
    CleanError, DataCleaner, DataLoader, DataSource, DatasetSchema, QuarantineReason,
};
use shooting_insights::pipeline::{HOUR_CHART_FILE, MURDER_CHART_FILE, TREND_CHART_FILE};
use shooting_insights::{Pipeline, ReportConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/shootings_sample.csv")
}

fn config(output_dir: &TempDir) -> ReportConfig {
    ReportConfig {
        source: fixture().to_string_lossy().into_owned(),
        output_dir: output_dir.path().to_path_buf(),
        render_charts: false,
        ..ReportConfig::default()
    }
}

fn load_fixture() -> polars::prelude::DataFrame {
    DataLoader::new(Duration::from_secs(5), DatasetSchema::nypd_shootings())
        .expect("client builds")
        .load(&DataSource::File(fixture()))
        .expect("fixture loads")
}

#[test]
fn run_produces_summary_with_quarantine_report() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let outcome = Pipeline::new(config(&dir)).run()?;
    let summary = &outcome.summary;

    assert_eq!(summary.raw_rows, 89);
    assert_eq!(summary.canonical_rows, 86);
    assert_eq!(summary.quarantined.len(), 3);
    assert_eq!(
        summary.quarantined.iter().map(|q| q.row).collect::<Vec<_>>(),
        vec![86, 87, 88]
    );
    assert_eq!(summary.quarantine_counts.get("malformed time"), Some(&2));
    assert_eq!(summary.quarantine_counts.get("malformed date"), Some(&1));
    assert!(outcome.charts.is_empty());

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&outcome.summary_path)?)?;
    assert_eq!(json["canonical_rows"], 86);
    assert_eq!(json["trend"]["reference_region"], "BRONX");
    Ok(())
}

#[test]
fn run_renders_all_three_charts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let config = ReportConfig {
        render_charts: true,
        ..config(&dir)
    };
    let outcome = Pipeline::new(config).run()?;

    assert_eq!(outcome.charts.len(), 3);
    for name in [MURDER_CHART_FILE, TREND_CHART_FILE, HOUR_CHART_FILE] {
        let path = dir.path().join(name);
        assert!(outcome.charts.contains(&path), "{name} not reported");
        assert!(std::fs::metadata(&path)?.len() > 0, "{name} is empty");
    }
    Ok(())
}

#[test]
fn aggregates_are_consistent_with_canonical_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let summary = Pipeline::new(config(&dir)).run()?.summary;
    let total = summary.canonical_rows as u64;

    let mut per_region: HashMap<&str, f64> = HashMap::new();
    for share in &summary.murder_by_region {
        *per_region.entry(share.region.as_str()).or_insert(0.0) += share.percent;
    }
    assert_eq!(per_region.len(), 5);
    assert!(per_region.values().all(|sum| (sum - 100.0).abs() < 0.01));

    let staten = summary
        .murder_by_region
        .iter()
        .find(|s| s.region == "STATEN ISLAND" && s.murder)
        .expect("staten island murders");
    assert_eq!(staten.count, 2);
    assert!((staten.percent - 20.0).abs() < 1e-9);

    assert_eq!(summary.murder_by_region.iter().map(|s| s.count).sum::<u64>(), total);
    assert_eq!(summary.yearly_by_region.iter().map(|y| y.count).sum::<u64>(), total);
    assert_eq!(summary.hourly_counts.iter().map(|h| h.count).sum::<u64>(), total);
    assert!(summary.hourly_counts.iter().all(|h| h.hour <= 23));
    assert_eq!(summary.yearly_by_region.len(), 15);

    let trend = summary.trend.as_ref().expect("trend fitted");
    assert_eq!(trend.observations, 15);
    assert_eq!(trend.region_trends.len(), 5);
    assert!(summary.trend_error.is_none());

    let perp_age = summary
        .unknown_counts
        .iter()
        .find(|c| c.column == "PERP_AGE_GROUP")
        .expect("text column");
    assert!(perp_age.unknown > 0);
    Ok(())
}

#[test]
fn canonical_records_match_raw_rows() -> Result<(), Box<dyn std::error::Error>> {
    let raw = load_fixture();
    let cleaned = DataCleaner::default().clean(&raw)?;

    let names: Vec<String> = cleaned
        .canonical
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    for dropped in [OCCUR_DATE, OCCUR_TIME, "X_COORD_CD", "Y_COORD_CD", "Latitude", "Longitude", "Lon_Lat"] {
        assert!(!names.iter().any(|n| n == dropped), "{dropped} kept");
    }
    assert!(names.iter().any(|n| n == OCCUR_DATETIME));

    let records = cleaned.records()?;
    assert_eq!(records.len(), 86);
    for record in &records {
        assert!(record.hour() <= 23);
        assert!(record.fields.values().all(|v| !v.is_empty() && v != "(null)"));
    }

    let scenario = records
        .iter()
        .find(|r| r.fields.get("INCIDENT_KEY").map(String::as_str) == Some("7777"))
        .expect("scenario row");
    assert_eq!(scenario.timestamp.to_rfc3339(), "2020-01-15T23:45:00-05:00");
    assert_eq!(scenario.hour(), 23);
    assert_eq!(scenario.region, "BROOKLYN");
    assert!(scenario.murder);

    let null_time = &cleaned.quarantined[0];
    assert_eq!(null_time.reason, QuarantineReason::MalformedTime);
    assert_eq!(null_time.time_text.as_deref(), Some("(null)"));

    let added = records
        .iter()
        .find(|r| r.fields.get("INCIDENT_KEY").map(String::as_str) == Some("8000"))
        .expect("staten island row");
    assert_eq!(added.fields.get("PERP_SEX").map(String::as_str), Some(UNKNOWN));
    Ok(())
}

#[test]
fn cleaning_canonical_output_again_fails_fast() -> Result<(), Box<dyn std::error::Error>> {
    let cleaner = DataCleaner::default();
    let cleaned = cleaner.clean(&load_fixture())?;

    assert!(matches!(
        cleaner.clean(&cleaned.canonical),
        Err(CleanError::AlreadyCanonical)
    ));
    Ok(())
}

#[test]
fn missing_source_aborts_without_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let out = dir.path().join("report");
    let config = ReportConfig {
        source: dir.path().join("absent.csv").to_string_lossy().into_owned(),
        output_dir: out.clone(),
        render_charts: false,
        ..ReportConfig::default()
    };

    let err = Pipeline::new(config).run().unwrap_err();
    assert!(err.to_string().starts_with("Source unavailable"));
    assert!(!out.exists());
    Ok(())
}
