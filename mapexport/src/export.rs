//! Export configuration.
//!
//! An [`ExportConfig`] pins one rectangular region of one map layer at one
//! zoom level. Its corners are normalized on construction so that tile
//! enumeration steps in exact zoom strides.

use std::fmt;

use crate::coord::{
    checked_ceil_to_zoom, floor_to_zoom, project_world_to_tile, to_tile_group, zoom_stride,
    MapProjection, TileCoords, TileGroupCoords, TileRange, WorldCoords, MAX_ZOOM,
};
use crate::error::ConfigError;

/// Largest number of tiles a single export may cover.
pub const MAX_EXPORT_TILES: i64 = 1 << 20;

/// Identity of a map layer on the server.
///
/// `name` is used for local directories, `prefix` for remote paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapId {
    pub world: String,
    pub map: String,
    pub prefix: String,
}

impl MapId {
    pub fn new(world: impl Into<String>, map: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            map: map.into(),
            prefix: prefix.into(),
        }
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.world, self.map)
    }
}

/// One configured export, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Name of the export, used in logs.
    pub name: String,
    pub map: MapId,
    pub zoom: u8,
    /// Lowest corner, floor-aligned to the zoom stride.
    pub from: TileCoords,
    /// Highest corner, ceil-aligned to the zoom stride.
    pub to: TileCoords,
}

impl ExportConfig {
    /// Build an export from two tile-coordinate corners in any order.
    pub fn from_tiles(
        name: impl Into<String>,
        map: MapId,
        zoom: u8,
        corner_a: TileCoords,
        corner_b: TileCoords,
    ) -> Result<Self, ConfigError> {
        if zoom > MAX_ZOOM {
            return Err(ConfigError::InvalidZoom(zoom as u32));
        }

        let name = name.into();
        let invalid = |reason: String| ConfigError::InvalidRange {
            export: name.clone(),
            reason,
        };

        let from = floor_to_zoom(corner_a.min(corner_b), zoom);
        let upper = corner_a.max(corner_b);
        let to = checked_ceil_to_zoom(upper, zoom).ok_or_else(|| {
            invalid(format!("corner {} does not align to zoom {}", upper, zoom))
        })?;

        let range = TileRange::new(from, to, zoom_stride(zoom));
        let count = range.columns().checked_mul(range.rows());
        if count.map_or(true, |count| count > MAX_EXPORT_TILES) {
            return Err(invalid(format!(
                "{} x {} tiles exceeds the limit of {}",
                range.columns(),
                range.rows(),
                MAX_EXPORT_TILES
            )));
        }

        Ok(Self {
            name,
            map,
            zoom,
            from,
            to,
        })
    }

    /// Build an export from two world positions projected through the map.
    pub fn from_world(
        name: impl Into<String>,
        map: MapId,
        projection: &MapProjection,
        zoom: u8,
        corner_a: WorldCoords,
        corner_b: WorldCoords,
    ) -> Result<Self, ConfigError> {
        if zoom > MAX_ZOOM {
            return Err(ConfigError::InvalidZoom(zoom as u32));
        }

        let a = project_world_to_tile(corner_a, projection, zoom);
        let b = project_world_to_tile(corner_b, projection, zoom);
        Self::from_tiles(name, map, zoom, a, b)
    }

    /// Tile-coordinate step at this export's zoom.
    pub fn stride(&self) -> i32 {
        zoom_stride(self.zoom)
    }

    /// Every tile of the export, row-major.
    pub fn tiles(&self) -> TileRange {
        TileRange::new(self.from, self.to, self.stride())
    }

    /// Number of tiles covered.
    pub fn tile_count(&self) -> usize {
        self.tiles().len()
    }

    /// Distinct tile groups covered, sorted.
    pub fn tile_groups(&self) -> Vec<TileGroupCoords> {
        let mut groups: Vec<_> = self.tiles().map(to_tile_group).collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }
}

impl fmt::Display for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} zoom {} from {} to {})",
            self.name, self.map, self.zoom, self.from, self.to
        )
    }
}
