//! CLI error handling with user-friendly messages.
//!
//! Every command returns [`CliError`]; `main` prints it and exits with
//! status 1.

use std::fmt;
use std::process;

use mapexport::config::ConfigFileError;
use mapexport::error::{ConfigError, FetchError};
use mapexport::ExportError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or parsed
    ConfigFile(ConfigFileError),
    /// Invalid setup outside the configuration file
    Config(String),
    /// Failed to create the export service
    ServiceCreation(ExportError),
    /// An export operation failed
    Export(ExportError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ServiceCreation(ExportError::Fetch(FetchError::InvalidUrl { .. })) => {
                eprintln!();
                eprintln!("Set the map server address in the [server] section, e.g.:");
                eprintln!("  url = http://localhost:8123");
            }
            CliError::ServiceCreation(ExportError::Fetch(_)) => {
                eprintln!();
                eprintln!("Is the map web server running and reachable?");
            }
            CliError::Export(ExportError::Config(ConfigError::UnknownWorld(_)))
            | CliError::Export(ExportError::Config(ConfigError::UnknownMap { .. })) => {
                eprintln!();
                eprintln!("Run 'mapexport debug' to list the available worlds and maps.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration error: {}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ServiceCreation(e) => write!(f, "Failed to start export service: {}", e),
            CliError::Export(e) => write!(f, "Export failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::ServiceCreation(e) => Some(e),
            CliError::Export(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ExportError> for CliError {
    fn from(e: ExportError) -> Self {
        CliError::Export(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = CliError::LoggingInit("permission denied".to_string());
        assert_eq!(e.to_string(), "Failed to initialize logging: permission denied");

        let e = CliError::Export(ExportError::CycleInProgress);
        assert_eq!(e.to_string(), "Export failed: an export cycle is already in progress");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let e = CliError::from(ExportError::Cancelled);
        assert!(e.source().is_some());
        assert!(CliError::Config("x".to_string()).source().is_none());
    }
}
