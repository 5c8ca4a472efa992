use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::metrics::{catalog, time_stage};
use crate::pipeline::ingestion::load_table;
use crate::pipeline::processing::{
    Cleaner, CleaningPolicy, CleaningReport, Enricher, LineValueEnricher, Normalizer,
};
use crate::pipeline::reporting::{ReportSet, ReportSettings, Reporter};
use crate::pipeline::storage::{SqliteStore, TransactionStore};
use crate::pipeline::visualize::Visualizer;

pub const REPORTS_FILE: &str = "reports.json";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Normalize,
    Clean,
    Enrich,
    Store,
    Report,
    Visualize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Normalize => "normalize",
            Stage::Clean => "clean",
            Stage::Enrich => "enrich",
            Stage::Store => "store",
            Stage::Report => "report",
            Stage::Visualize => "visualize",
        }
    }

    fn failed(&self) -> String {
        format!("{} stage failed", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reports and charts produced from the persisted table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub reports: ReportSet,
    pub charts: Vec<PathBuf>,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: String,
    pub source_sha256: String,
    pub rows_loaded: usize,
    pub date_parse_failures: usize,
    pub cleaning: CleaningReport,
    pub rows_persisted: usize,
    pub database: String,
    pub table: String,
    pub output: ReportOutput,
}

impl PipelineResult {
    pub fn write_summary(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Load, clean and persist the source, then report and chart from the
    /// persisted table. Any stage failure aborts the run.
    pub fn run(config: &Config) -> anyhow::Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("pipeline", %run_id);
        let _enter = span.enter();

        let source = &config.source.path;
        info!(source = %source.display(), "Starting pipeline");

        let (raw, source_sha256) = {
            let _timing = time_stage(Stage::Load.as_str());
            let raw = load_table(source, config.source.sheet.as_deref())
                .with_context(|| Stage::Load.failed())?;
            let digest = fingerprint(source).with_context(|| Stage::Load.failed())?;
            (raw, digest)
        };
        ::metrics::counter!(catalog::ROWS_LOADED_TOTAL).increment(raw.len() as u64);

        let normalized = {
            let _timing = time_stage(Stage::Normalize.as_str());
            Normalizer::new()
                .normalize(&raw)
                .with_context(|| Stage::Normalize.failed())?
        };
        drop(raw);

        let cleaned = {
            let _timing = time_stage(Stage::Clean.as_str());
            Cleaner::with_policy(CleaningPolicy {
                drop_unparsed_dates: config.cleaning.drop_unparsed_dates,
            })
            .clean(&normalized.records)
        };

        let transactions = {
            let _timing = time_stage(Stage::Enrich.as_str());
            LineValueEnricher::new().enrich_all(&cleaned.records)
        };

        let store = SqliteStore::new(&config.store.db_path);
        let rows_persisted = {
            let _timing = time_stage(Stage::Store.as_str());
            store
                .save(&transactions, &config.store.table)
                .with_context(|| Stage::Store.failed())?
        };

        let output = Self::report_from(&store, config)?;

        let result = PipelineResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            source: source.display().to_string(),
            source_sha256,
            rows_loaded: normalized.records.len(),
            date_parse_failures: normalized.date_parse_failures,
            cleaning: cleaned.report,
            rows_persisted,
            database: config.store.db_path.display().to_string(),
            table: config.store.table.clone(),
            output,
        };
        result
            .write_summary(&config.charts.output_dir.join(SUMMARY_FILE))
            .context("writing run summary failed")?;

        info!(
            rows_loaded = result.rows_loaded,
            rows_persisted = result.rows_persisted,
            "Pipeline finished"
        );
        Ok(result)
    }

    /// Report and chart from an existing database without reloading the source
    #[instrument(skip(config), fields(db = %config.store.db_path.display()))]
    pub fn report(config: &Config) -> anyhow::Result<ReportOutput> {
        let store = SqliteStore::new(&config.store.db_path);
        Self::report_from(&store, config)
    }

    fn report_from<S: TransactionStore>(
        store: &S,
        config: &Config,
    ) -> anyhow::Result<ReportOutput> {
        let reports = {
            let _timing = time_stage(Stage::Report.as_str());
            let reporter = Reporter::new(
                store,
                config.store.table.clone(),
                ReportSettings::from(&config.report),
            );
            let reports = reporter.run_all().with_context(|| Stage::Report.failed())?;
            reports
                .write_json(&config.charts.output_dir.join(REPORTS_FILE))
                .with_context(|| Stage::Report.failed())?;
            reports
        };

        let charts = {
            let _timing = time_stage(Stage::Visualize.as_str());
            Visualizer::new(&config.charts)
                .render_country_charts(&reports)
                .with_context(|| Stage::Visualize.failed())?
        };

        Ok(ReportOutput { reports, charts })
    }
}

/// SHA-256 of the source file, hex encoded
fn fingerprint(path: &Path) -> crate::error::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stage_failure_message_names_stage() {
        assert_eq!(Stage::Store.failed(), "store stage failed");
        assert_eq!(Stage::Visualize.to_string(), "visualize");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retail.csv");
        std::fs::write(&path, "InvoiceNo\n536365\n").unwrap();

        let first = fingerprint(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, fingerprint(&path).unwrap());
    }
}
