// Persistence boundary: the cleaned snapshot and the aggregate queries over it

pub mod query;
pub mod sqlite;

use rusqlite::types::Value;

use crate::error::Result;
use crate::pipeline::processing::enrich::Transaction;

pub use query::{AggregateQuery, GroupKey, SortOrder};
pub use sqlite::SqliteStore;

/// Rows returned by a query, typed per the statement's projection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Storage trait for the persisted transactions snapshot
pub trait TransactionStore {
    /// Persist `table` under `name`, replacing any table of that name.
    /// Returns the number of rows written.
    fn save(&self, table: &[Transaction], name: &str) -> Result<usize>;

    /// Run a read-only statement and return its rows
    fn query(&self, sql: &str, params: &[Value]) -> Result<ResultTable>;
}
