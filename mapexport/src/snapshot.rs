//! Snapshots: the tile files of one export at one instant.
//!
//! A map directory holds kept snapshots as `{instant}/` directories, plus
//! `{instant}.png` mosaics next to them. Anything whose name does not parse
//! as an instant is ignored.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::addressing::{local_combined_file, local_export_dir, local_map_dir, parse_instant};
use crate::coord::TileCoords;
use crate::error::ExportError;
use crate::export::ExportConfig;

/// Tiles downloaded for one export cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub instant: DateTime<Utc>,
    pub dir: PathBuf,
    /// Successfully written tile files, keyed by tile coordinate.
    pub tiles: BTreeMap<TileCoords, PathBuf>,
}

impl Snapshot {
    pub fn new(instant: DateTime<Utc>, dir: PathBuf) -> Self {
        Self {
            instant,
            dir,
            tiles: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }
}

/// Instants of every snapshot recorded for this export's map, ascending.
///
/// Both tile directories and combined images count; duplicates collapse.
pub fn kept_instants(data_root: &Path, config: &ExportConfig) -> Vec<DateTime<Utc>> {
    let map_dir = local_map_dir(data_root, config);
    let entries = match fs::read_dir(&map_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %map_dir.display(), error = %e, "Could not list export directory");
            return Vec::new();
        }
    };

    let mut instants: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().and_then(parse_instant))
        .collect();
    instants.sort_unstable();
    instants.dedup();
    instants
}

/// Most recent kept snapshot of this export's map, if any.
pub fn latest_kept_instant(data_root: &Path, config: &ExportConfig) -> Option<DateTime<Utc>> {
    kept_instants(data_root, config).pop()
}

/// Instant for a new snapshot taken at `instant`.
///
/// Instants have whole-second resolution, so a cycle may start in the same
/// second as the latest kept snapshot (or earlier, after a clock step). The
/// new snapshot then moves to one second past it and never writes into an
/// existing snapshot.
pub fn unused_instant(
    data_root: &Path,
    config: &ExportConfig,
    instant: DateTime<Utc>,
) -> DateTime<Utc> {
    match latest_kept_instant(data_root, config) {
        Some(latest) if latest >= instant => {
            let moved = latest + chrono::Duration::seconds(1);
            debug!(
                export = %config.name,
                requested = %instant,
                instant = %moved,
                "Snapshot instant already taken, moving past latest"
            );
            moved
        }
        _ => instant,
    }
}

/// Delete the tile directory and combined image of one snapshot.
///
/// Missing parts are not an error.
pub fn remove_snapshot(
    data_root: &Path,
    config: &ExportConfig,
    instant: DateTime<Utc>,
) -> Result<(), ExportError> {
    let dir = local_export_dir(data_root, config, instant);
    match fs::remove_dir_all(&dir) {
        Ok(()) => debug!(path = %dir.display(), "Removed snapshot directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(ExportError::storage(dir, e)),
    }

    let combined = local_combined_file(data_root, config, instant);
    match fs::remove_file(&combined) {
        Ok(()) => debug!(path = %combined.display(), "Removed combined image"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(ExportError::storage(combined, e)),
    }

    Ok(())
}
