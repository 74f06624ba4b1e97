//! Structured logging with tracing
//!
//! Sets up:
//! - Console logging to stderr (text or JSON)
//! - Optional daily-rotated JSON file logging
//! - Level filtering from RUST_LOG

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling::daily};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::config::{LogFormat, MonitoringConfig};

/// Initialize the global tracing subscriber.
///
/// Returns the file writer guard when file logging is on; keep it alive for
/// the lifetime of the program or buffered lines are lost.
pub fn init_tracing(config: &MonitoringConfig) -> std::io::Result<Option<WorkerGuard>> {
    if !config.enabled {
        return Ok(None);
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let console_layer = match config.log_format {
        LogFormat::Json => fmt::layer().with_writer(std::io::stderr).json().boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(console_layer);

    if config.enable_file_logging {
        config.ensure_log_dir()?;
        let file_appender = daily(&config.log_dir, "cache.log");
        let (non_blocking_file, guard) = non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .json();

        let _ = registry.with(file_layer).try_init();
        return Ok(Some(guard));
    }

    let _ = registry.try_init();
    Ok(None)
}
