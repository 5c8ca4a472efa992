use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::TRANSACTIONS_TABLE;
use crate::error::{Result, RetailError};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub cleaning: CleaningConfig,
    pub report: ReportConfig,
    pub charts: ChartConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Worksheet to read; the first sheet when unset
    pub sheet: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/Online Retail.xlsx"),
            sheet: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("retail.db"),
            table: TRANSACTIONS_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Drop rows whose invoice date could not be parsed
    pub drop_unparsed_dates: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            drop_unparsed_dates: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Country value the trend and product reports are restricted to
    pub country_filter: String,
    /// Name used in chart titles; falls back to `country_filter`.
    /// Unset when a `[report]` table omits it, so a new filter is never
    /// labelled with the default country's name.
    #[serde(default)]
    pub country_display_name: Option<String>,
    pub top_n: usize,
    pub rounding_precision: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            country_filter: "EIRE".to_string(),
            country_display_name: Some("Ireland".to_string()),
            top_n: 10,
            rounding_precision: 2,
        }
    }
}

impl ReportConfig {
    pub fn display_name(&self) -> &str {
        self.country_display_name
            .as_deref()
            .unwrap_or(&self.country_filter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            width: 1000,
            height: 560,
        }
    }
}

impl Config {
    /// Load from `path`, or from `config.toml` when no path is given.
    ///
    /// A missing default file yields the built-in defaults; a missing file
    /// that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RetailError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.report.country_filter.trim().is_empty() {
            return Err(RetailError::Config(
                "report.country_filter must not be empty".to_string(),
            ));
        }
        if self.report.top_n == 0 {
            return Err(RetailError::Config(
                "report.top_n must be greater than zero".to_string(),
            ));
        }
        if self.report.rounding_precision > 10 {
            return Err(RetailError::Config(format!(
                "report.rounding_precision {} is out of range (0-10)",
                self.report.rounding_precision
            )));
        }
        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(RetailError::Config(
                "charts.width and charts.height must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
