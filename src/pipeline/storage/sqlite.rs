use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::constants::{persisted_columns, STORED_DATE_FORMAT};
use crate::error::Result;
use crate::metrics::catalog;
use crate::pipeline::processing::enrich::Transaction;
use crate::pipeline::storage::query::validate_identifier;
use crate::pipeline::storage::{ResultTable, TransactionStore};

/// SQLite-backed store. Holds only the database path: every call opens its
/// own connection and drops it before returning.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open_for_write(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Connection::open(&self.path)?)
    }

    fn open_read_only(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        DROP TABLE IF EXISTS {table};
        CREATE TABLE {table} (
            invoice_no   TEXT NOT NULL,
            stock_code   TEXT,
            description  TEXT,
            quantity     INTEGER NOT NULL,
            invoice_date TEXT,
            unit_price   REAL NOT NULL,
            customer_id  TEXT NOT NULL,
            country      TEXT,
            total_value  REAL NOT NULL
        );
        "#
    )
}

fn insert_sql(table: &str) -> String {
    let columns = persisted_columns();
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    )
}

impl TransactionStore for SqliteStore {
    /// Drop, recreate and fill `name` inside one transaction. Readers see
    /// either the previous table or the complete new one.
    #[instrument(skip(self, table), fields(db = %self.path.display(), rows = table.len()))]
    fn save(&self, table: &[Transaction], name: &str) -> Result<usize> {
        let name = validate_identifier(name)?;
        let mut conn = self.open_for_write()?;
        let tx = conn.transaction()?;

        tx.execute_batch(&create_table_sql(name))?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&insert_sql(name))?;
            for row in table {
                let invoice_date = row
                    .invoice_date
                    .map(|d| d.format(STORED_DATE_FORMAT).to_string());
                written += stmt.execute(params![
                    row.invoice_no,
                    row.stock_code,
                    row.description,
                    row.quantity,
                    invoice_date,
                    row.unit_price,
                    row.customer_id,
                    row.country,
                    row.total_value,
                ])?;
            }
        }
        tx.commit()?;

        ::metrics::counter!(catalog::ROWS_PERSISTED_TOTAL).increment(written as u64);
        info!(table = name, rows = written, "Persisted transactions table");
        Ok(written)
    }

    #[instrument(skip(self, params), fields(db = %self.path.display()))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<ResultTable> {
        let conn = self.open_read_only()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(rows = rows.len(), "Query returned");
        Ok(ResultTable { columns, rows })
    }
}
