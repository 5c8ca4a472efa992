use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{self, COLUMN_MAPPING};
use crate::error::{Result, RetailError};
use crate::metrics::catalog;
use crate::pipeline::ingestion::loader::{Cell, RawTable};

/// Text layouts accepted for `invoice_date`, tried in order
const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];
const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];

/// A transaction row under canonical column names.
/// Every field is nullable at this stage; the cleaner decides what survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub invoice_no: Option<String>,
    pub stock_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub invoice_date: Option<NaiveDateTime>,
    pub unit_price: Option<f64>,
    pub customer_id: Option<String>,
    pub country: Option<String>,
}

/// Output of the normalizer
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub records: Vec<NormalizedRecord>,
    /// Non-empty invoice date cells that could not be parsed and became null
    pub date_parse_failures: usize,
}

/// Positions of the mapped source columns in a raw table
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    invoice_no: usize,
    stock_code: usize,
    description: usize,
    quantity: usize,
    invoice_date: usize,
    unit_price: usize,
    customer_id: usize,
    country: usize,
}

impl ColumnIndex {
    /// Resolve every mapped source column, reporting all missing ones at once
    fn resolve(table: &RawTable) -> Result<Self> {
        let missing: Vec<String> = COLUMN_MAPPING
            .iter()
            .filter(|(src, _)| table.column_index(src).is_none())
            .map(|(src, _)| src.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RetailError::SchemaMismatch { missing });
        }

        let idx = |src: &str| table.column_index(src).unwrap_or_default();
        Ok(Self {
            invoice_no: idx(constants::SRC_INVOICE_NO),
            stock_code: idx(constants::SRC_STOCK_CODE),
            description: idx(constants::SRC_DESCRIPTION),
            quantity: idx(constants::SRC_QUANTITY),
            invoice_date: idx(constants::SRC_INVOICE_DATE),
            unit_price: idx(constants::SRC_UNIT_PRICE),
            customer_id: idx(constants::SRC_CUSTOMER_ID),
            country: idx(constants::SRC_COUNTRY),
        })
    }
}

/// Renames source columns to canonical names and coerces cell types
#[derive(Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedTable> {
        let columns = ColumnIndex::resolve(table)?;
        let mut date_parse_failures = 0;

        let records = table
            .rows
            .iter()
            .map(|row| {
                let date_cell = &row[columns.invoice_date];
                let invoice_date = coerce_datetime(date_cell);
                if invoice_date.is_none() && !date_cell.is_empty() {
                    date_parse_failures += 1;
                }

                NormalizedRecord {
                    invoice_no: coerce_text(&row[columns.invoice_no]),
                    stock_code: coerce_text(&row[columns.stock_code]),
                    description: coerce_text(&row[columns.description]),
                    quantity: coerce_integer(&row[columns.quantity]),
                    invoice_date,
                    unit_price: coerce_decimal(&row[columns.unit_price]),
                    customer_id: coerce_text(&row[columns.customer_id]),
                    country: coerce_text(&row[columns.country]),
                }
            })
            .collect::<Vec<_>>();

        if date_parse_failures > 0 {
            warn!(
                count = date_parse_failures,
                "Invoice dates could not be parsed and were set to null"
            );
            ::metrics::counter!(catalog::DATE_PARSE_FAILURES_TOTAL)
                .increment(date_parse_failures as u64);
        }
        debug!(rows = records.len(), "Normalized source table");

        Ok(NormalizedTable {
            records,
            date_parse_failures,
        })
    }
}

/// Identifier/text coercion: trimmed text, integral numbers without a fraction
fn coerce_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Cell::Int(i) => Some(i.to_string()),
        Cell::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{:.0}", f)),
        Cell::Float(f) => Some(f.to_string()),
        Cell::Bool(b) => Some(b.to_string()),
        Cell::DateTime(dt) => Some(dt.format(constants::STORED_DATE_FORMAT).to_string()),
    }
}

fn coerce_integer(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(i) => Some(*i),
        Cell::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        Cell::Text(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn coerce_decimal(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Int(i) => Some(*i as f64),
        Cell::Float(f) => Some(*f),
        Cell::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Coerce a cell to a timestamp; anything unparsable becomes `None`
pub fn coerce_datetime(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Text(s) => parse_datetime(s.trim()),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}
