use crate::estimation::DEFAULT_TIMEZONE;
use crate::report::{DEFAULT_BATCH_SIZE, DEFAULT_OUTPUT_DIR, ReportSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub data: Option<DataSection>,
    #[serde(default)]
    pub report: Option<ReportSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8000)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSection {
    /// Directory holding store_status.csv, menu_hours.csv and timezones.csv
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSection {
    /// Where finished CSV reports are written (default: reports)
    pub output_dir: Option<PathBuf>,
    /// Stores per progress log line (default: 100)
    pub batch_size: Option<usize>,
    /// Zone used for stores without a timezone record (default: America/Chicago)
    pub default_timezone: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the server port (default: 8000)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn data_dir(&self) -> Option<&Path> {
        let dir = self.data.as_ref()?.dir.as_deref()?;
        if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        }
    }

    pub fn report_settings(&self) -> ReportSettings {
        let section = self.report.as_ref();
        ReportSettings {
            output_dir: section
                .and_then(|s| s.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            batch_size: section
                .and_then(|s| s.batch_size)
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            default_timezone: section
                .and_then(|s| s.default_timezone.clone())
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        }
    }

    /// Returns the configured log level, falling back to INFO when unrecognised.
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}
