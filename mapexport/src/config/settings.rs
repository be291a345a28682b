//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing logic.

use std::path::PathBuf;
use std::time::Duration;

use crate::change::ChangeStrategy;
use crate::coord::{TileCoords, WorldCoords};
use crate::error::ConfigError;
use crate::export::ExportConfig;
use crate::server::ServerConfiguration;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Map server settings
    pub server: ServerSettings,
    /// Export cycle settings
    pub export: ExportSettings,
    /// Logging settings
    pub logging: LoggingSettings,
    /// One entry per `[export.<name>]` section, in file order
    pub exports: Vec<ExportEntry>,
}

/// `[server]`
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Base URL of the live map web server
    pub url: String,
    /// Per-request timeout in seconds
    pub timeout: u64,
    /// Maximum parallel tile downloads
    pub concurrency: usize,
}

/// `[export]`
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Root of the `exports/` tree and the last-export record
    pub data_dir: PathBuf,
    /// Interval between scheduled cycles; `None` disables the timer
    pub schedule: Option<Duration>,
    pub strategy: ChangeStrategy,
    /// Changed-pixel fraction that keeps a snapshot (threshold strategy)
    pub change_threshold: f64,
    /// Build a mosaic for every kept snapshot
    pub auto_combine: bool,
    /// Kept snapshots per map, 0 keeps everything
    pub retain: usize,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

/// Requested area of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportRange {
    /// Tile-coordinate corners.
    Tiles { from: TileCoords, to: TileCoords },
    /// World-coordinate corners, projected through the map.
    World { from: WorldCoords, to: WorldCoords },
}

/// `[export.<name>]`, not yet resolved against the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub name: String,
    pub world: String,
    pub map: String,
    pub zoom: u8,
    pub range: ExportRange,
}

impl ExportEntry {
    /// Resolve world and map names and normalize the range.
    pub fn build(&self, server: &ServerConfiguration) -> Result<ExportConfig, ConfigError> {
        let (map, projection) = server.resolve(&self.world, &self.map)?;
        match self.range {
            ExportRange::Tiles { from, to } => {
                ExportConfig::from_tiles(&self.name, map, self.zoom, from, to)
            }
            ExportRange::World { from, to } => {
                ExportConfig::from_world(&self.name, map, &projection, self.zoom, from, to)
            }
        }
    }
}
