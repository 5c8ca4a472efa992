use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::catalog;
use crate::pipeline::processing::normalize::NormalizedRecord;

/// A record that passed every cleaning rule. Identifier, quantity and price
/// are no longer optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub invoice_no: String,
    pub stock_code: Option<String>,
    pub description: Option<String>,
    pub quantity: i64,
    /// Null only when the policy keeps unparsed dates
    pub invoice_date: Option<NaiveDateTime>,
    pub unit_price: f64,
    pub customer_id: String,
    pub country: Option<String>,
}

/// Why a row was removed; a row is attributed to the first rule that rejects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// `invoice_no` or `customer_id` is null
    MissingIdentifier,
    /// `invoice_date` is null (failed to parse or absent)
    MissingInvoiceDate,
    /// `quantity` is null or not strictly positive
    NonPositiveQuantity,
    /// `unit_price` is null or not strictly positive
    NonPositivePrice,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::MissingIdentifier => "missing_identifier",
            RejectionReason::MissingInvoiceDate => "missing_invoice_date",
            RejectionReason::NonPositiveQuantity => "non_positive_quantity",
            RejectionReason::NonPositivePrice => "non_positive_price",
        }
    }
}

/// Row-removal policy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningPolicy {
    /// Drop rows whose invoice date is null. The null-drop step of the
    /// retail export treats an unparsed date like a missing identifier;
    /// turning this off keeps those rows in a null month group.
    pub drop_unparsed_dates: bool,
}

impl Default for CleaningPolicy {
    fn default() -> Self {
        Self {
            drop_unparsed_dates: true,
        }
    }
}

/// Row counts for one cleaning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub dropped_missing_identifier: usize,
    pub dropped_missing_invoice_date: usize,
    pub dropped_non_positive_quantity: usize,
    pub dropped_non_positive_price: usize,
}

impl CleaningReport {
    pub fn dropped_rows(&self) -> usize {
        self.input_rows - self.output_rows
    }

    fn record(&mut self, reason: RejectionReason) {
        match reason {
            RejectionReason::MissingIdentifier => self.dropped_missing_identifier += 1,
            RejectionReason::MissingInvoiceDate => self.dropped_missing_invoice_date += 1,
            RejectionReason::NonPositiveQuantity => self.dropped_non_positive_quantity += 1,
            RejectionReason::NonPositivePrice => self.dropped_non_positive_price += 1,
        }
    }

    fn count_for(&self, reason: RejectionReason) -> usize {
        match reason {
            RejectionReason::MissingIdentifier => self.dropped_missing_identifier,
            RejectionReason::MissingInvoiceDate => self.dropped_missing_invoice_date,
            RejectionReason::NonPositiveQuantity => self.dropped_non_positive_quantity,
            RejectionReason::NonPositivePrice => self.dropped_non_positive_price,
        }
    }
}

/// Output of the cleaner
#[derive(Debug, Clone, Default)]
pub struct CleanedTable {
    pub records: Vec<CleanRecord>,
    pub report: CleaningReport,
}

/// Removes incomplete and invalid rows. Never fails; an empty result is valid.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    pub policy: CleaningPolicy,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CleaningPolicy) -> Self {
        Self { policy }
    }

    pub fn clean(&self, records: &[NormalizedRecord]) -> CleanedTable {
        let mut report = CleaningReport {
            input_rows: records.len(),
            ..Default::default()
        };
        let mut cleaned = Vec::with_capacity(records.len());

        for record in records {
            match self.check(record) {
                Ok(clean) => cleaned.push(clean),
                Err(reason) => report.record(reason),
            }
        }
        report.output_rows = cleaned.len();

        for reason in [
            RejectionReason::MissingIdentifier,
            RejectionReason::MissingInvoiceDate,
            RejectionReason::NonPositiveQuantity,
            RejectionReason::NonPositivePrice,
        ] {
            let count = report.count_for(reason);
            if count > 0 {
                debug!(reason = reason.as_str(), count, "Dropped rows");
                ::metrics::counter!(catalog::ROWS_DROPPED_TOTAL, "reason" => reason.as_str())
                    .increment(count as u64);
            }
        }
        info!(
            input = report.input_rows,
            kept = report.output_rows,
            dropped = report.dropped_rows(),
            "Cleaned transaction table"
        );

        CleanedTable {
            records: cleaned,
            report,
        }
    }

    /// Apply the rules in order: identifiers, date (per policy), quantity, price
    fn check(&self, record: &NormalizedRecord) -> Result<CleanRecord, RejectionReason> {
        let (invoice_no, customer_id) = match (&record.invoice_no, &record.customer_id) {
            (Some(invoice_no), Some(customer_id)) => (invoice_no.clone(), customer_id.clone()),
            _ => return Err(RejectionReason::MissingIdentifier),
        };

        if self.policy.drop_unparsed_dates && record.invoice_date.is_none() {
            return Err(RejectionReason::MissingInvoiceDate);
        }

        let quantity = match record.quantity {
            Some(q) if q > 0 => q,
            _ => return Err(RejectionReason::NonPositiveQuantity),
        };

        let unit_price = match record.unit_price {
            Some(p) if p > 0.0 => p,
            _ => return Err(RejectionReason::NonPositivePrice),
        };

        Ok(CleanRecord {
            invoice_no,
            stock_code: record.stock_code.clone(),
            description: record.description.clone(),
            quantity,
            invoice_date: record.invoice_date,
            unit_price,
            customer_id,
            country: record.country.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn valid_record() -> NormalizedRecord {
        NormalizedRecord {
            invoice_no: Some("536365".to_string()),
            stock_code: Some("71053".to_string()),
            description: Some("WHITE METAL LANTERN".to_string()),
            quantity: Some(6),
            invoice_date: NaiveDate::from_ymd_opt(2010, 12, 1)
                .and_then(|d| d.and_hms_opt(8, 26, 0)),
            unit_price: Some(3.39),
            customer_id: Some("17850".to_string()),
            country: Some("United Kingdom".to_string()),
        }
    }

    #[test]
    fn test_valid_record_survives() {
        let cleaned = Cleaner::new().clean(&[valid_record()]);
        assert_eq!(cleaned.records.len(), 1);
        assert_eq!(cleaned.records[0].quantity, 6);
        assert_eq!(cleaned.report.dropped_rows(), 0);
    }

    #[test]
    fn test_survival_matches_predicate() {
        let quantities = [None, Some(-1), Some(0), Some(1)];
        let prices = [None, Some(-0.5), Some(0.0), Some(0.01)];
        let ids = [None, Some("C1".to_string())];

        let mut inputs = Vec::new();
        for q in quantities {
            for p in prices {
                for invoice in &ids {
                    for customer in &ids {
                        let mut r = valid_record();
                        r.quantity = q;
                        r.unit_price = p;
                        r.invoice_no = invoice.clone();
                        r.customer_id = customer.clone();
                        inputs.push(r);
                    }
                }
            }
        }

        let cleaned = Cleaner::new().clean(&inputs);
        let expected: Vec<&NormalizedRecord> = inputs
            .iter()
            .filter(|r| {
                r.invoice_no.is_some()
                    && r.customer_id.is_some()
                    && r.quantity.map_or(false, |q| q > 0)
                    && r.unit_price.map_or(false, |p| p > 0.0)
            })
            .collect();

        assert_eq!(cleaned.records.len(), expected.len());
        assert_eq!(cleaned.records.len(), 1);
        assert_eq!(cleaned.report.input_rows, inputs.len());
        assert_eq!(cleaned.report.dropped_rows(), inputs.len() - 1);
    }

    #[test]
    fn test_zero_quantity_and_zero_price_are_excluded() {
        let mut zero_qty = valid_record();
        zero_qty.quantity = Some(0);
        let mut zero_price = valid_record();
        zero_price.unit_price = Some(0.0);

        let cleaned = Cleaner::new().clean(&[zero_qty, zero_price]);
        assert!(cleaned.records.is_empty());
        assert_eq!(cleaned.report.dropped_non_positive_quantity, 1);
        assert_eq!(cleaned.report.dropped_non_positive_price, 1);
    }

    #[test]
    fn test_first_failing_rule_is_reported() {
        let mut record = valid_record();
        record.customer_id = None;
        record.quantity = Some(-5);

        let cleaned = Cleaner::new().clean(&[record]);
        assert_eq!(cleaned.report.dropped_missing_identifier, 1);
        assert_eq!(cleaned.report.dropped_non_positive_quantity, 0);
    }

    #[test]
    fn test_unparsed_date_policy() {
        let mut record = valid_record();
        record.invoice_date = None;

        let dropped = Cleaner::new().clean(&[record.clone()]);
        assert!(dropped.records.is_empty());
        assert_eq!(dropped.report.dropped_missing_invoice_date, 1);

        let kept = Cleaner::with_policy(CleaningPolicy {
            drop_unparsed_dates: false,
        })
        .clean(&[record]);
        assert_eq!(kept.records.len(), 1);
        assert!(kept.records[0].invoice_date.is_none());
    }

    #[test]
    fn test_all_rows_dropped_is_not_an_error() {
        let mut record = valid_record();
        record.invoice_no = None;

        let cleaned = Cleaner::new().clean(&[record]);
        assert!(cleaned.records.is_empty());
        assert_eq!(cleaned.report.output_rows, 0);
    }
}
