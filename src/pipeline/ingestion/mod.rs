// Pipeline ingestion: reading the raw spreadsheet source

pub mod loader;

pub use loader::{columns, load_table, Cell, RawTable, SourceFormat};
