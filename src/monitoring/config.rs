//! Monitoring configuration
//!
//! Loads from environment variables:
//! - MONITORING_ENABLED: Enable/disable logging setup (true/false)
//! - RUST_LOG: Tracing level (debug, info, warn, error)
//! - LOG_FORMAT: Console output format (json or text)
//! - LOG_DIR: Directory for log files (default: ~/.sajtmaskin/logs)
//! - LOG_FILE_ENABLED: Also write daily-rotated JSON logs (true/false)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,

    /// Log level (debug, info, warn, error)
    pub log_level: String,

    pub log_format: LogFormat,

    pub log_dir: PathBuf,

    pub enable_file_logging: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            log_dir: Self::default_log_dir(),
            enable_file_logging: false,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(enabled) = std::env::var("MONITORING_ENABLED") {
            config.enabled = enabled.to_lowercase() == "true";
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = std::env::var("LOG_FORMAT") {
            if let Ok(format) = log_format.parse() {
                config.log_format = format;
            }
        }

        if let Ok(log_dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        if let Ok(file) = std::env::var("LOG_FILE_ENABLED") {
            config.enable_file_logging = file.to_lowercase() == "true" || file == "1";
        }

        config
    }

    /// Default log directory: ~/.sajtmaskin/logs
    pub fn default_log_dir() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(format!("{}/.sajtmaskin/logs", home))
    }

    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        if !self.log_dir.exists() {
            std::fs::create_dir_all(&self.log_dir)?;
            tracing::info!(path = %self.log_dir.display(), "Created log directory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap().as_str(), "text");
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_ensure_log_dir_creates_nested_path() {
        let tmp = tempfile::tempdir().unwrap();
        let config = MonitoringConfig {
            log_dir: tmp.path().join("a/b/logs"),
            ..MonitoringConfig::default()
        };
        config.ensure_log_dir().unwrap();
        assert!(config.log_dir.is_dir());
    }
}
