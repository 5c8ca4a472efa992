use anyhow::Result;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

use retail_report::config::Config;
use retail_report::constants::persisted_columns;
use retail_report::pipeline::orchestrator::{REPORTS_FILE, SUMMARY_FILE};
use retail_report::pipeline::visualize::{MONTHLY_CHART_FILE, PRODUCTS_CHART_FILE};
use retail_report::pipeline::{Pipeline, ReportRow};
use retail_report::RetailError;

const HEADER: &str =
    "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country";

const ROWS: [&str; 6] = [
    "536365,85123A,WHITE HANGING HEART,6,12/01/2010 08:26,2.55,17850,United Kingdom",
    "536366,22633,HAND WARMER,2,12/01/2010 08:28,10.00,17851,EIRE",
    "536367,22745,POPPY'S PLAYHOUSE,3,01/05/2011 09:00,5.00,13047,EIRE",
    "C536379,D,Discount,-1,12/01/2010 09:41,27.50,14527,United Kingdom",
    "536368,22960,JAM MAKING SET,4,not a date,4.25,13047,France",
    "536369,22961,FREE ITEM,1,12/02/2010 10:00,0,13047,France",
];

fn write_source(dir: &Path, header: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join("retail.csv");
    let mut body = String::from(header);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    body.push('\n');
    fs::write(&path, body).unwrap();
    path
}

fn test_config(dir: &TempDir, source: PathBuf) -> Config {
    let mut config = Config::default();
    config.source.path = source;
    config.store.db_path = dir.path().join("retail.db");
    config.charts.output_dir = dir.path().join("output");
    config
}

fn assert_rows(actual: &[ReportRow], expected: &[(&str, f64)]) {
    assert_eq!(actual.len(), expected.len(), "rows: {:?}", actual);
    for (row, (label, revenue)) in actual.iter().zip(expected) {
        assert_eq!(row.label, *label);
        assert!(
            (row.revenue - revenue).abs() < 1e-9,
            "{}: {} != {}",
            label,
            row.revenue,
            revenue
        );
    }
}

#[test]
fn test_end_to_end_run() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS);
    let config = test_config(&dir, source);

    let result = Pipeline::run(&config)?;

    assert_eq!(result.rows_loaded, 6);
    assert_eq!(result.date_parse_failures, 1);
    assert_eq!(result.cleaning.dropped_missing_invoice_date, 1);
    assert_eq!(result.cleaning.dropped_non_positive_quantity, 1);
    assert_eq!(result.cleaning.dropped_non_positive_price, 1);
    assert_eq!(result.rows_persisted, 3);
    assert_eq!(result.source_sha256.len(), 64);

    let reports = &result.output.reports;
    assert_rows(
        &reports.top_countries.rows,
        &[("EIRE", 35.0), ("United Kingdom", 15.3)],
    );
    assert_rows(
        &reports.monthly_revenue.rows,
        &[("2010-12", 35.3), ("2011-01", 15.0)],
    );
    assert_rows(
        &reports.country_monthly_revenue.rows,
        &[("2010-12", 20.0), ("2011-01", 15.0)],
    );
    assert_rows(
        &reports.country_top_products.rows,
        &[("HAND WARMER", 20.0), ("POPPY'S PLAYHOUSE", 15.0)],
    );
    assert!(reports.country_monthly_revenue.title.contains("Ireland"));

    let output_dir = &config.charts.output_dir;
    assert!(output_dir.join(REPORTS_FILE).exists());
    assert!(output_dir.join(SUMMARY_FILE).exists());
    assert!(output_dir.join(MONTHLY_CHART_FILE).exists());
    assert!(output_dir.join(PRODUCTS_CHART_FILE).exists());
    assert_eq!(result.output.charts.len(), 2);

    Ok(())
}

#[test]
fn test_persisted_table_matches_clean_rows() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS);
    let config = test_config(&dir, source);
    Pipeline::run(&config)?;

    let conn = Connection::open(&config.store.db_path)?;
    let stmt = conn.prepare("SELECT * FROM transactions")?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    assert_eq!(columns, persisted_columns());

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
    assert_eq!(count, 3);

    let (date, total): (String, f64) = conn.query_row(
        "SELECT invoice_date, total_value FROM transactions WHERE invoice_no = '536366'",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(date, "2010-12-01 08:28:00");
    assert!((total - 20.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_rerun_replaces_table() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS);
    let config = test_config(&dir, source);

    let first = Pipeline::run(&config)?;
    let second = Pipeline::run(&config)?;

    assert_eq!(first.rows_persisted, second.rows_persisted);
    assert_eq!(first.output.reports, second.output.reports);
    assert_ne!(first.run_id, second.run_id);

    let conn = Connection::open(&config.store.db_path)?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
    assert_eq!(count, 3);

    Ok(())
}

#[test]
fn test_report_reads_existing_database() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS);
    let config = test_config(&dir, source.clone());
    let run = Pipeline::run(&config)?;

    // Reporting must not depend on the source once it is persisted
    fs::remove_file(&source)?;
    let output = Pipeline::report(&config)?;
    assert_eq!(output.reports, run.output.reports);

    Ok(())
}

#[test]
fn test_unmatched_country_yields_empty_reports() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS);
    let mut config = test_config(&dir, source);
    config.report.country_filter = "Atlantis".to_string();
    config.report.country_display_name = None;

    let result = Pipeline::run(&config)?;
    let reports = &result.output.reports;

    assert_eq!(reports.top_countries.len(), 2);
    assert!(reports.country_monthly_revenue.is_empty());
    assert!(reports.country_top_products.is_empty());
    assert!(reports.country_top_products.title.contains("Atlantis"));
    // Charts are still written, just without data
    assert_eq!(result.output.charts.len(), 2);

    Ok(())
}

#[test]
fn test_top_n_limits_report_rows() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS);
    let mut config = test_config(&dir, source);
    config.report.top_n = 1;

    let result = Pipeline::run(&config)?;
    assert_rows(&result.output.reports.top_countries.rows, &[("EIRE", 35.0)]);
    assert_rows(
        &result.output.reports.country_top_products.rows,
        &[("HAND WARMER", 20.0)],
    );

    Ok(())
}

#[test]
fn test_missing_column_fails_before_store() {
    let dir = tempdir().unwrap();
    let header = "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,CustomerID,Country";
    let source = write_source(
        dir.path(),
        header,
        &["536365,85123A,WHITE HANGING HEART,6,12/01/2010 08:26,17850,United Kingdom"],
    );
    let config = test_config(&dir, source);

    let err = Pipeline::run(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("normalize stage failed"));
    match err.downcast_ref::<RetailError>() {
        Some(RetailError::SchemaMismatch { missing }) => {
            assert_eq!(missing, &vec!["UnitPrice".to_string()]);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
    assert!(!config.store.db_path.exists());
}

#[test]
fn test_missing_source_is_reported() {
    let dir = tempdir().unwrap();
    let config = test_config(&dir, dir.path().join("absent.xlsx"));

    let err = Pipeline::run(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("load stage failed"));
    assert!(matches!(
        err.downcast_ref::<RetailError>(),
        Some(RetailError::SourceRead { .. })
    ));
}

#[test]
fn test_failed_rerun_keeps_previous_table() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS);
    let config = test_config(&dir, source.clone());
    Pipeline::run(&config)?;

    fs::write(&source, "InvoiceNo,Country\n536365,EIRE\n")?;
    assert!(Pipeline::run(&config).is_err());

    let conn = Connection::open(&config.store.db_path)?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
    assert_eq!(count, 3);

    Ok(())
}

#[test]
fn test_columns_lists_source_headers() -> Result<()> {
    let dir = tempdir()?;
    let source = write_source(dir.path(), HEADER, &ROWS[..1]);

    let columns = retail_report::pipeline::ingestion::columns(&source, None)?;
    assert_eq!(columns.join(","), HEADER);

    Ok(())
}
