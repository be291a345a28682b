//! Configuration for MapExport.
//!
//! Settings are read from an INI file (default `~/.mapexport/config.ini`).
//! A missing file yields defaults; malformed values are reported as
//! [`ConfigFileError::InvalidValue`] naming the offending key.
//!
//! ```ini
//! [server]
//! url = http://localhost:8123
//!
//! [export]
//! schedule = 1h
//! strategy = threshold
//! change_threshold = 0.1
//!
//! [export.spawn]
//! world = world
//! map = flat
//! zoom = 1
//! from = -32,-32
//! to = 32,32
//! ```

mod defaults;
mod duration;
mod file;
mod parser;
mod settings;

pub use defaults::{
    default_log_dir, DEFAULT_CONCURRENCY, DEFAULT_LOG_FILE, DEFAULT_SERVER_URL, MAX_CONCURRENCY,
};
pub use duration::{format_duration, parse_duration};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, ExportEntry, ExportRange, ExportSettings, LoggingSettings, ServerSettings,
};
