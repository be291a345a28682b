//! Remote and local paths for tiles, hashes and snapshots.
//!
//! Remote paths follow the map server's file-tree layout:
//!
//! ```text
//! tiles/{world}/{prefix}/{group_x}_{group_y}/{zoom_prefix}{x}_{y}.png
//! tiles/{world}/{prefix}/{group_x}_{group_y}.hash
//! ```
//!
//! Local snapshots live under `{data_root}/exports/{world}/{map}/`, one
//! directory per export instant plus a sibling `{instant}.png` mosaic.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::coord::{to_tile_group, TileCoords, TileGroupCoords};
use crate::export::ExportConfig;

/// Compact UTC timestamp without separators that are unsafe in file names.
pub const INSTANT_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Directory under the data root holding every export.
pub const EXPORTS_DIR: &str = "exports";

/// The server's zoom prefix: empty at zoom 0, otherwise `zoom` × `z` and `_`.
pub fn zoom_prefix(zoom: u8) -> String {
    if zoom == 0 {
        String::new()
    } else {
        format!("{}_", "z".repeat(zoom as usize))
    }
}

/// File name of one tile, shared by the remote and local layouts.
pub fn tile_file_name(zoom: u8, tile: TileCoords) -> String {
    format!("{}{}_{}.png", zoom_prefix(zoom), tile.x, tile.y)
}

/// Remote path of a tile image, relative to the server root.
pub fn remote_tile_path(config: &ExportConfig, tile: TileCoords) -> String {
    format!(
        "tiles/{}/{}/{}/{}",
        config.map.world,
        config.map.prefix,
        to_tile_group(tile),
        tile_file_name(config.zoom, tile)
    )
}

/// Remote path of a tile group's change hash.
pub fn remote_hash_path(config: &ExportConfig, group: TileGroupCoords) -> String {
    format!(
        "tiles/{}/{}/{}.hash",
        config.map.world, config.map.prefix, group
    )
}

/// Formats an instant as e.g. `20220804T213215Z`.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format(INSTANT_FORMAT).to_string()
}

/// Parses a file or directory name produced by [`format_instant`].
///
/// A trailing `.png` is ignored. Any other suffix, such as a leftover
/// `.png.part`, does not name an instant.
pub fn parse_instant(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(".png").unwrap_or(name);
    NaiveDateTime::parse_from_str(stem, INSTANT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// `{data_root}/exports/{world}`
pub fn local_world_dir(data_root: &Path, config: &ExportConfig) -> PathBuf {
    data_root.join(EXPORTS_DIR).join(&config.map.world)
}

/// `{data_root}/exports/{world}/{map}`
pub fn local_map_dir(data_root: &Path, config: &ExportConfig) -> PathBuf {
    local_world_dir(data_root, config).join(&config.map.map)
}

/// `{data_root}/exports/{world}/{map}/{instant}`
pub fn local_export_dir(data_root: &Path, config: &ExportConfig, instant: DateTime<Utc>) -> PathBuf {
    local_map_dir(data_root, config).join(format_instant(instant))
}

/// `{data_root}/exports/{world}/{map}/{instant}/{zoom_prefix}{x}_{y}.png`
pub fn local_tile_file(
    data_root: &Path,
    config: &ExportConfig,
    instant: DateTime<Utc>,
    tile: TileCoords,
) -> PathBuf {
    local_export_dir(data_root, config, instant).join(tile_file_name(config.zoom, tile))
}

/// `{data_root}/exports/{world}/{map}/{instant}.png`
pub fn local_combined_file(
    data_root: &Path,
    config: &ExportConfig,
    instant: DateTime<Utc>,
) -> PathBuf {
    local_map_dir(data_root, config).join(format!("{}.png", format_instant(instant)))
}

/// `{data_root}/exports/{world}/{prefix}_{group_x}_{group_y}.hash`
pub fn local_hash_file(data_root: &Path, config: &ExportConfig, group: TileGroupCoords) -> PathBuf {
    local_world_dir(data_root, config).join(format!("{}_{}.hash", config.map.prefix, group))
}
