use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::processing::clean::CleanRecord;

/// A cleaned transaction carrying its derived line value.
/// This is the shape of one row in the persisted `transactions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub invoice_no: String,
    pub stock_code: Option<String>,
    pub description: Option<String>,
    pub quantity: i64,
    pub invoice_date: Option<NaiveDateTime>,
    pub unit_price: f64,
    pub customer_id: String,
    pub country: Option<String>,
    /// `quantity * unit_price`, unrounded
    pub total_value: f64,
}

/// Trait for deriving computed fields on cleaned records
pub trait Enricher {
    fn enrich(&self, record: &CleanRecord) -> Transaction;

    fn enrich_all(&self, records: &[CleanRecord]) -> Vec<Transaction> {
        let enriched: Vec<Transaction> = records.iter().map(|r| self.enrich(r)).collect();
        debug!(rows = enriched.len(), "Enriched cleaned records");
        enriched
    }
}

/// Adds `total_value` to every record
#[derive(Debug, Clone, Copy, Default)]
pub struct LineValueEnricher;

impl LineValueEnricher {
    pub fn new() -> Self {
        Self
    }
}

impl Enricher for LineValueEnricher {
    fn enrich(&self, record: &CleanRecord) -> Transaction {
        Transaction {
            invoice_no: record.invoice_no.clone(),
            stock_code: record.stock_code.clone(),
            description: record.description.clone(),
            quantity: record.quantity,
            invoice_date: record.invoice_date,
            unit_price: record.unit_price,
            customer_id: record.customer_id.clone(),
            country: record.country.clone(),
            total_value: record.quantity as f64 * record.unit_price,
        }
    }
}
