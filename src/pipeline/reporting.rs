use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::config::ReportConfig;
use crate::constants::{COUNTRY, DESCRIPTION, UNKNOWN_LABEL};
use crate::error::{Result, RetailError};
use crate::metrics::catalog;
use crate::pipeline::storage::query::REVENUE_ALIAS;
use crate::pipeline::storage::{AggregateQuery, GroupKey, ResultTable, SortOrder, TransactionStore};

pub const TOP_COUNTRIES: &str = "top_countries";
pub const MONTHLY_REVENUE: &str = "monthly_revenue";
pub const COUNTRY_MONTHLY_REVENUE: &str = "country_monthly_revenue";
pub const COUNTRY_TOP_PRODUCTS: &str = "country_top_products";

/// One aggregation row: grouping key plus rounded revenue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    pub revenue: f64,
}

impl ReportRow {
    pub fn new(label: impl Into<String>, revenue: f64) -> Self {
        Self {
            label: label.into(),
            revenue,
        }
    }
}

/// Result table of a single report query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub name: String,
    pub title: String,
    pub key_column: String,
    /// Decimal places the revenue column was rounded to
    pub precision: usize,
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for ReportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if self.rows.is_empty() {
            return writeln!(f, "   (no rows)");
        }

        let key_width = self
            .rows
            .iter()
            .map(|r| r.label.chars().count())
            .chain(std::iter::once(self.key_column.len()))
            .max()
            .unwrap_or(0);
        writeln!(
            f,
            "   {:<width$}  {:>14}",
            self.key_column,
            REVENUE_ALIAS,
            width = key_width
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "   {:<width$}  {:>14.*}",
                row.label,
                self.precision,
                row.revenue,
                width = key_width
            )?;
        }
        Ok(())
    }
}

/// The four fixed reports of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSet {
    pub top_countries: ReportTable,
    pub monthly_revenue: ReportTable,
    pub country_monthly_revenue: ReportTable,
    pub country_top_products: ReportTable,
}

impl ReportSet {
    pub fn tables(&self) -> [&ReportTable; 4] {
        [
            &self.top_countries,
            &self.monthly_revenue,
            &self.country_monthly_revenue,
            &self.country_top_products,
        ]
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Named knobs for the report queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub country_filter: String,
    pub country_label: String,
    pub top_n: usize,
    pub rounding_precision: u32,
}

impl From<&ReportConfig> for ReportSettings {
    fn from(config: &ReportConfig) -> Self {
        Self {
            country_filter: config.country_filter.clone(),
            country_label: config.display_name().to_string(),
            top_n: config.top_n,
            rounding_precision: config.rounding_precision,
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

/// Runs the fixed aggregate reports against a store. Holds no results
/// between calls.
pub struct Reporter<'a, S: TransactionStore> {
    store: &'a S,
    table: String,
    settings: ReportSettings,
}

impl<'a, S: TransactionStore> Reporter<'a, S> {
    pub fn new(store: &'a S, table: impl Into<String>, settings: ReportSettings) -> Self {
        Self {
            store,
            table: table.into(),
            settings,
        }
    }

    /// Top-N countries by revenue, largest first
    pub fn top_countries(&self) -> Result<ReportTable> {
        let query = AggregateQuery::revenue_by(GroupKey::column(COUNTRY))
            .limit(self.settings.top_n)
            .precision(self.settings.rounding_precision);
        self.run(
            TOP_COUNTRIES,
            format!("Top {} Countries by Revenue", self.settings.top_n),
            &query,
        )
    }

    /// Revenue per calendar month, oldest first
    pub fn monthly_revenue(&self) -> Result<ReportTable> {
        let query = AggregateQuery::revenue_by(GroupKey::Month)
            .sorted(SortOrder::KeyAsc)
            .precision(self.settings.rounding_precision);
        self.run(MONTHLY_REVENUE, "Monthly Revenue Trend".to_string(), &query)
    }

    /// Monthly revenue restricted to `country`
    pub fn country_monthly_revenue(&self, country: &str) -> Result<ReportTable> {
        let query = AggregateQuery::revenue_by(GroupKey::Month)
            .filtered(COUNTRY, country)
            .sorted(SortOrder::KeyAsc)
            .precision(self.settings.rounding_precision);
        self.run(
            COUNTRY_MONTHLY_REVENUE,
            format!("Monthly Revenue Trend in {}", self.label_for(country)),
            &query,
        )
    }

    /// Top-N products by revenue within `country`
    pub fn country_top_products(&self, country: &str) -> Result<ReportTable> {
        let query = AggregateQuery::revenue_by(GroupKey::column(DESCRIPTION))
            .filtered(COUNTRY, country)
            .limit(self.settings.top_n)
            .precision(self.settings.rounding_precision);
        self.run(
            COUNTRY_TOP_PRODUCTS,
            format!(
                "Top {} Products by Revenue in {}",
                self.settings.top_n,
                self.label_for(country)
            ),
            &query,
        )
    }

    /// All four reports, the country-scoped ones for the configured filter
    #[instrument(skip(self), fields(country = %self.settings.country_filter))]
    pub fn run_all(&self) -> Result<ReportSet> {
        let country = self.settings.country_filter.as_str();
        let set = ReportSet {
            top_countries: self.top_countries()?,
            monthly_revenue: self.monthly_revenue()?,
            country_monthly_revenue: self.country_monthly_revenue(country)?,
            country_top_products: self.country_top_products(country)?,
        };
        info!(
            countries = set.top_countries.len(),
            months = set.monthly_revenue.len(),
            country_months = set.country_monthly_revenue.len(),
            country_products = set.country_top_products.len(),
            "Reports complete"
        );
        Ok(set)
    }

    fn label_for<'c>(&'c self, country: &'c str) -> &'c str {
        if country == self.settings.country_filter {
            &self.settings.country_label
        } else {
            country
        }
    }

    fn run(&self, name: &str, title: String, query: &AggregateQuery) -> Result<ReportTable> {
        let (sql, params) = query.to_sql(&self.table)?;
        debug!(report = name, %sql, "Running report query");
        let result = self.store.query(&sql, &params)?;

        let key_idx = result_column(&result, query.group_key.alias())?;
        let revenue_idx = result_column(&result, REVENUE_ALIAS)?;
        let rows = result
            .rows
            .iter()
            .map(|row| {
                let label = label_from(row.get(key_idx));
                let revenue = revenue_from(row.get(revenue_idx))?;
                Ok(ReportRow { label, revenue })
            })
            .collect::<Result<Vec<_>>>()?;

        ::metrics::counter!(catalog::REPORT_ROWS_TOTAL, "report" => name.to_string())
            .increment(rows.len() as u64);
        Ok(ReportTable {
            name: name.to_string(),
            title,
            key_column: query.group_key.alias().to_string(),
            precision: query.precision as usize,
            rows,
        })
    }
}

fn result_column(result: &ResultTable, name: &str) -> Result<usize> {
    result
        .column_index(name)
        .ok_or_else(|| RetailError::ReportValue {
            column: name.to_string(),
            value: format!("not in result columns {:?}", result.columns),
        })
}

fn label_from(value: Option<&Value>) -> String {
    match value {
        Some(Value::Text(s)) => s.clone(),
        Some(Value::Integer(i)) => i.to_string(),
        Some(Value::Real(f)) => f.to_string(),
        Some(Value::Blob(b)) => String::from_utf8_lossy(b).into_owned(),
        Some(Value::Null) | None => UNKNOWN_LABEL.to_string(),
    }
}

fn revenue_from(value: Option<&Value>) -> Result<f64> {
    match value {
        Some(Value::Real(f)) => Ok(*f),
        Some(Value::Integer(i)) => Ok(*i as f64),
        other => Err(RetailError::ReportValue {
            column: REVENUE_ALIAS.to_string(),
            value: format!("{:?}", other),
        }),
    }
}
