use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

use crate::constants::{INVOICE_DATE, TOTAL_VALUE};
use crate::error::{Result, RetailError};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Alias of the aggregated measure in every revenue query
pub const REVENUE_ALIAS: &str = "revenue";
/// Alias of the calendar-month grouping key
pub const MONTH_ALIAS: &str = "month";

/// Table and column names are interpolated into SQL, so only plain identifiers pass
pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(RetailError::InvalidIdentifier(name.to_string()))
    }
}

/// What rows are grouped by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// A persisted column, e.g. `country` or `description`
    Column(String),
    /// Calendar year-month of `invoice_date`, rendered `YYYY-MM`
    Month,
}

impl GroupKey {
    pub fn column(name: impl Into<String>) -> Self {
        GroupKey::Column(name.into())
    }

    pub fn alias(&self) -> &str {
        match self {
            GroupKey::Column(name) => name,
            GroupKey::Month => MONTH_ALIAS,
        }
    }

    fn expression(&self) -> Result<String> {
        match self {
            GroupKey::Column(name) => Ok(validate_identifier(name)?.to_string()),
            GroupKey::Month => Ok(format!("strftime('%Y-%m', {})", INVOICE_DATE)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Largest aggregate first; ties broken by key ascending
    ValueDesc,
    /// Group key ascending (chronological for months)
    KeyAsc,
}

/// Builder for the `SUM(total_value)` aggregate queries behind every report
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub group_key: GroupKey,
    pub filter: Option<(String, String)>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
    pub precision: u32,
}

impl AggregateQuery {
    /// Revenue summed per `group_key`, sorted by value, unbounded, 2 decimals
    pub fn revenue_by(group_key: GroupKey) -> Self {
        Self {
            group_key,
            filter: None,
            sort: SortOrder::ValueDesc,
            limit: None,
            precision: 2,
        }
    }

    pub fn filtered(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((column.into(), value.into()));
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Render the statement against `table`; values are bound, never inlined
    pub fn to_sql(&self, table: &str) -> Result<(String, Vec<Value>)> {
        let table = validate_identifier(table)?;
        let key_expr = self.group_key.expression()?;
        let alias = validate_identifier(self.group_key.alias())?;

        let mut params = vec![Value::Integer(i64::from(self.precision))];
        let mut sql = format!(
            "SELECT {key_expr} AS {alias}, ROUND(SUM({TOTAL_VALUE}), ?) AS {REVENUE_ALIAS} FROM {table}"
        );

        if let Some((column, value)) = &self.filter {
            sql.push_str(&format!(" WHERE {} = ?", validate_identifier(column)?));
            params.push(Value::Text(value.clone()));
        }

        sql.push_str(&format!(" GROUP BY {alias}"));
        match self.sort {
            SortOrder::ValueDesc => {
                sql.push_str(&format!(" ORDER BY {REVENUE_ALIAS} DESC, {alias} ASC"))
            }
            SortOrder::KeyAsc => sql.push_str(&format!(" ORDER BY {alias} ASC")),
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(limit as i64));
        }

        Ok((sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_n_by_column() {
        let (sql, params) = AggregateQuery::revenue_by(GroupKey::column("country"))
            .limit(10)
            .to_sql("transactions")
            .unwrap();

        assert_eq!(
            sql,
            "SELECT country AS country, ROUND(SUM(total_value), ?) AS revenue FROM transactions \
             GROUP BY country ORDER BY revenue DESC, country ASC LIMIT ?"
        );
        assert_eq!(params, vec![Value::Integer(2), Value::Integer(10)]);
    }

    #[test]
    fn test_filtered_monthly_trend() {
        let (sql, params) = AggregateQuery::revenue_by(GroupKey::Month)
            .filtered("country", "EIRE")
            .sorted(SortOrder::KeyAsc)
            .precision(3)
            .to_sql("transactions")
            .unwrap();

        assert_eq!(
            sql,
            "SELECT strftime('%Y-%m', invoice_date) AS month, ROUND(SUM(total_value), ?) AS revenue \
             FROM transactions WHERE country = ? GROUP BY month ORDER BY month ASC"
        );
        assert_eq!(
            params,
            vec![Value::Integer(3), Value::Text("EIRE".to_string())]
        );
    }

    #[test]
    fn test_filter_value_is_bound_not_inlined() {
        let (sql, _) = AggregateQuery::revenue_by(GroupKey::column("description"))
            .filtered("country", "x'; DROP TABLE transactions; --")
            .to_sql("transactions")
            .unwrap();
        assert!(!sql.contains("DROP"));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let result = AggregateQuery::revenue_by(GroupKey::column("country; --"))
            .to_sql("transactions");
        assert!(matches!(result, Err(RetailError::InvalidIdentifier(_))));

        let result = AggregateQuery::revenue_by(GroupKey::Month).to_sql("my table");
        assert!(matches!(result, Err(RetailError::InvalidIdentifier(_))));
    }
}
