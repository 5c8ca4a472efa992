/// Column name constants to keep the loader, store and reports in agreement.
/// Source headers are the names found in the retail workbook; canonical names
/// are what every stage after the normalizer uses.

// Source headers (as exported by the retail system)
pub const SRC_INVOICE_NO: &str = "InvoiceNo";
pub const SRC_STOCK_CODE: &str = "StockCode";
pub const SRC_DESCRIPTION: &str = "Description";
pub const SRC_QUANTITY: &str = "Quantity";
pub const SRC_INVOICE_DATE: &str = "InvoiceDate";
pub const SRC_UNIT_PRICE: &str = "UnitPrice";
pub const SRC_CUSTOMER_ID: &str = "CustomerID";
pub const SRC_COUNTRY: &str = "Country";

// Canonical column names
pub const INVOICE_NO: &str = "invoice_no";
pub const STOCK_CODE: &str = "stock_code";
pub const DESCRIPTION: &str = "description";
pub const QUANTITY: &str = "quantity";
pub const INVOICE_DATE: &str = "invoice_date";
pub const UNIT_PRICE: &str = "unit_price";
pub const CUSTOMER_ID: &str = "customer_id";
pub const COUNTRY: &str = "country";
pub const TOTAL_VALUE: &str = "total_value";

/// Table the cleaned snapshot is persisted under
pub const TRANSACTIONS_TABLE: &str = "transactions";

/// Storage format for `invoice_date`; `strftime` in SQLite reads it directly
pub const STORED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Label used for a NULL group key in report output
pub const UNKNOWN_LABEL: &str = "(unknown)";

/// Static rename mapping from source header to canonical column
pub const COLUMN_MAPPING: [(&str, &str); 8] = [
    (SRC_INVOICE_NO, INVOICE_NO),
    (SRC_STOCK_CODE, STOCK_CODE),
    (SRC_DESCRIPTION, DESCRIPTION),
    (SRC_QUANTITY, QUANTITY),
    (SRC_INVOICE_DATE, INVOICE_DATE),
    (SRC_UNIT_PRICE, UNIT_PRICE),
    (SRC_CUSTOMER_ID, CUSTOMER_ID),
    (SRC_COUNTRY, COUNTRY),
];

/// Columns of the persisted table, in order
pub fn persisted_columns() -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = COLUMN_MAPPING.iter().map(|(_, c)| *c).collect();
    columns.push(TOTAL_VALUE);
    columns
}

/// Convert a source header to its canonical name, if it is mapped
pub fn canonical_name(source_header: &str) -> Option<&'static str> {
    COLUMN_MAPPING
        .iter()
        .find(|(src, _)| *src == source_header.trim())
        .map(|(_, canonical)| *canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name_trims_header() {
        assert_eq!(canonical_name(" CustomerID "), Some(CUSTOMER_ID));
        assert_eq!(canonical_name("customer_id"), None);
    }

    #[test]
    fn test_persisted_columns_end_with_total_value() {
        let columns = persisted_columns();
        assert_eq!(columns.len(), 9);
        assert_eq!(columns[0], INVOICE_NO);
        assert_eq!(columns.last(), Some(&TOTAL_VALUE));
    }
}
