use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetailError {
    #[error("Failed to read source '{path}': {reason}")]
    SourceRead { path: String, reason: String },

    #[error("Source is missing required columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("SQLite error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Unexpected value in report column '{column}': {value}")]
    ReportValue { column: String, value: String },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetailError {
    pub fn source_read(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        RetailError::SourceRead {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RetailError>;
