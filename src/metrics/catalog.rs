//! Metric names and their documentation

use crate::metrics::{MetricDoc, MetricType};

pub const ROWS_LOADED_TOTAL: &str = "retail_rows_loaded_total";
pub const DATE_PARSE_FAILURES_TOTAL: &str = "retail_date_parse_failures_total";
pub const ROWS_DROPPED_TOTAL: &str = "retail_rows_dropped_total";
pub const ROWS_PERSISTED_TOTAL: &str = "retail_rows_persisted_total";
pub const REPORT_ROWS_TOTAL: &str = "retail_report_rows_total";
pub const STAGE_DURATION_SECONDS: &str = "retail_stage_duration_seconds";

pub fn documentation() -> Vec<MetricDoc> {
    vec![
        MetricDoc {
            name: ROWS_LOADED_TOTAL,
            metric_type: MetricType::Counter,
            help: "Data rows read from the source spreadsheet",
        },
        MetricDoc {
            name: DATE_PARSE_FAILURES_TOTAL,
            metric_type: MetricType::Counter,
            help: "Invoice dates that failed to parse and were set to null",
        },
        MetricDoc {
            name: ROWS_DROPPED_TOTAL,
            metric_type: MetricType::Counter,
            help: "Rows removed by the cleaner",
        },
        MetricDoc {
            name: ROWS_PERSISTED_TOTAL,
            metric_type: MetricType::Counter,
            help: "Rows written to the transactions table",
        },
        MetricDoc {
            name: REPORT_ROWS_TOTAL,
            metric_type: MetricType::Counter,
            help: "Rows returned by report queries",
        },
        MetricDoc {
            name: STAGE_DURATION_SECONDS,
            metric_type: MetricType::Histogram,
            help: "Wall time spent in each pipeline stage",
        },
    ]
}
