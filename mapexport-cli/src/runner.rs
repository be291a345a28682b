//! CLI runner for common setup and operations.
//!
//! Loads configuration, initializes logging and builds the export service
//! so command handlers only deal with their own work.

use std::path::{Path, PathBuf};

use tracing::info;

use mapexport::config::{config_file_path, ConfigFile};
use mapexport::logging::{init_logging, LoggingGuard};
use mapexport::ExportService;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config_path: PathBuf,
    config: ConfigFile,
}

impl CliRunner {
    /// Load `config_path` (or the default file) and start logging.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config_path = config_path.unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config_path,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Re-read the configuration file the runner was started with.
    pub fn reload_config(&self) -> Result<ConfigFile, CliError> {
        Ok(ConfigFile::load_from(&self.config_path)?)
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("MapExport v{}", mapexport::VERSION);
        info!(
            config = %self.config_path.display(),
            "MapExport CLI: {} command", command
        );
    }

    /// Create the export service.
    ///
    /// Builds a blocking HTTP client, so call this outside any async runtime.
    pub fn create_service(&self) -> Result<ExportService, CliError> {
        ExportService::with_reqwest(self.config.clone())
            .map_err(CliError::ServiceCreation)
            .inspect(|_| info!("Export service created"))
    }
}
