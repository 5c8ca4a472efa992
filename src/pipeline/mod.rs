// Retail ETL pipeline: ingestion, processing, storage, reporting, and charts
// Loader -> Normalizer -> Cleaner -> Enricher -> Store -> Reporter -> Visualizer

pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod reporting;
pub mod storage;
pub mod visualize;

// Re-export key types from each stage
pub use orchestrator::{Pipeline, PipelineResult, ReportOutput, Stage};
pub use reporting::{ReportRow, ReportSet, ReportTable, Reporter};
