//! Default values for every configuration setting.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::change::{ChangeStrategy, DEFAULT_CHANGE_THRESHOLD};
use crate::http::DEFAULT_TIMEOUT_SECS;

/// Default map server address (Dynmap's built-in web server).
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8123";

/// Default number of parallel tile downloads.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Upper bound on parallel tile downloads.
pub const MAX_CONCURRENCY: usize = 64;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "mapexport.log";

/// Clamp concurrency to `1..=MAX_CONCURRENCY`, warning when adjusted.
pub(super) fn clamp_concurrency(value: usize) -> usize {
    let clamped = value.clamp(1, MAX_CONCURRENCY);
    if clamped != value {
        tracing::warn!(
            requested = value,
            max = MAX_CONCURRENCY,
            "concurrency out of range, clamping to {}",
            clamped
        );
    }
    clamped
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            data_dir: config_directory(),
            schedule: None,
            strategy: ChangeStrategy::default(),
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            auto_combine: true,
            retain: 0,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("logs"),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            export: ExportSettings::default(),
            logging: LoggingSettings::default(),
            exports: Vec::new(),
        }
    }
}

/// Default location of the log directory.
pub fn default_log_dir() -> PathBuf {
    LoggingSettings::default().directory
}
