//! Logging and metrics for the cache layer.

pub mod config;
pub mod metrics;
pub mod tracing_config;

pub use config::{LogFormat, MonitoringConfig};
pub use tracing_config::init_tracing;
