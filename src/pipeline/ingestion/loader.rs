use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{Result, RetailError};

/// A single cell as read from the source, before any coercion
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Raw table exactly as the source laid it out: header row plus data rows.
/// Every row has one cell per header.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == header)
    }

    fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }
}

/// Supported source formats, picked by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    Csv,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            "csv" => Ok(SourceFormat::Csv),
            other => Err(RetailError::source_read(
                path,
                format!("unsupported file extension '{}'", other),
            )),
        }
    }
}

/// Read the source at `path` into a raw table.
///
/// `sheet` selects a worksheet for workbook sources and is ignored for CSV.
#[instrument(skip(path, sheet), fields(path = %path.display()))]
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    if !path.exists() {
        return Err(RetailError::source_read(path, "file does not exist"));
    }

    let table = match SourceFormat::from_path(path)? {
        SourceFormat::Workbook => load_workbook(path, sheet)?,
        SourceFormat::Csv => load_csv(path)?,
    };

    info!(
        rows = table.len(),
        columns = table.headers.len(),
        "Loaded source table"
    );
    Ok(table)
}

/// Header row of the source, as the source spells it
pub fn columns(path: &Path, sheet: Option<&str>) -> Result<Vec<String>> {
    load_table(path, sheet).map(|t| t.headers)
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| RetailError::source_read(path, e))?;

    let sheet_name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(RetailError::source_read(
                    path,
                    format!("worksheet '{}' not found", name),
                ));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| RetailError::source_read(path, "workbook has no worksheets"))?,
    };
    debug!(sheet = %sheet_name, "Reading worksheet");

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| RetailError::source_read(path, e))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| RetailError::source_read(path, "worksheet has no header row"))?;

    let mut table = RawTable {
        headers: header_row.iter().map(header_text).collect(),
        rows: Vec::with_capacity(range.height().saturating_sub(1)),
    };
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(cell_from_data).collect();
        // calamine pads ragged ranges with empties; skip rows that are blank end to end
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn load_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| RetailError::source_read(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| RetailError::source_read(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(RetailError::source_read(path, "file has no header row"));
    }

    let mut table = RawTable {
        headers,
        rows: Vec::new(),
    };
    for record in reader.records() {
        let record = record.map_err(|e| RetailError::source_read(path, e))?;
        let cells: Vec<Cell> = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        table.push_row(cells);
    }
    Ok(table)
}

fn header_text(data: &Data) -> String {
    match data {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_source_read_error() {
        let err = load_table(Path::new("/nonexistent/retail.xlsx"), None).unwrap_err();
        assert!(matches!(err, RetailError::SourceRead { .. }));
    }

    #[test]
    fn test_unknown_extension_is_source_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retail.json");
        std::fs::write(&path, "{}").unwrap();

        let err = load_table(&path, None).unwrap_err();
        assert!(matches!(err, RetailError::SourceRead { .. }));
    }

    #[test]
    fn test_load_csv_pads_short_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retail.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "InvoiceNo,Quantity,Country").unwrap();
        writeln!(file, "536365,6,United Kingdom").unwrap();
        writeln!(file, "536366,,").unwrap();
        writeln!(file, "536367").unwrap();
        drop(file);

        let table = load_table(&path, None).unwrap();
        assert_eq!(table.headers, vec!["InvoiceNo", "Quantity", "Country"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0][2], Cell::Text("United Kingdom".to_string()));
        assert_eq!(table.rows[1][1], Cell::Empty);
        assert_eq!(table.rows[2].len(), 3);
        assert_eq!(table.column_index("Country"), Some(2));
    }

    #[test]
    fn test_workbook_error_cells_become_empty() {
        assert_eq!(
            cell_from_data(&Data::Error(calamine::CellErrorType::NA)),
            Cell::Empty
        );
        assert_eq!(cell_from_data(&Data::Float(2.55)), Cell::Float(2.55));
        assert_eq!(
            cell_from_data(&Data::String("WHITE METAL LANTERN".to_string())),
            Cell::Text("WHITE METAL LANTERN".to_string())
        );
    }
}
