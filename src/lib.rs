pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::Config;
pub use error::{Result, RetailError};
pub use pipeline::{Pipeline, PipelineResult};
