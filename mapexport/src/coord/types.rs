//! Coordinate type definitions

use std::fmt;

/// Highest supported zoom-out level.
///
/// Tile strides are `2^zoom`; the cap keeps every stride and pixel offset
/// well inside `i32`.
pub const MAX_ZOOM: u8 = 16;

/// Number of tiles along one side of a tile group.
pub const TILE_GROUP_SIZE: i32 = 32;

/// Shift that maps a tile coordinate onto its tile group.
pub const TILE_GROUP_SHIFT: u32 = 5;

/// Pixels per tile edge, and the divisor applied to projected coordinates.
pub const TILE_SCALE: f64 = 128.0;

/// Height used when a position is given as `x`/`z` only.
pub const SEA_LEVEL_Y: i32 = 64;

/// In-world block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldCoords {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl WorldCoords {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    fn as_vector(&self) -> [f64; 3] {
        [self.x as f64, self.y as f64, self.z as f64]
    }
}

impl fmt::Display for WorldCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Position in the tile grid at a specific zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoords {
    pub x: i32,
    pub y: i32,
}

impl TileCoords {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise minimum of two corners.
    pub fn min(self, other: TileCoords) -> TileCoords {
        TileCoords::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum of two corners.
    pub fn max(self, other: TileCoords) -> TileCoords {
        TileCoords::new(self.x.max(other.x), self.y.max(other.y))
    }
}

impl fmt::Display for TileCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A 32×32 block of tiles, the granularity of server-side change hashes.
///
/// Formats as `x_y`, the form used in both tile and hash paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileGroupCoords {
    pub x: i32,
    pub y: i32,
}

impl TileGroupCoords {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileGroupCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.x, self.y)
    }
}

/// Linear world-to-map transform of one map layer.
///
/// The first two rows of the server's 3×3 `worldtomap` matrix project a
/// world position onto the unscaled tile plane; the third row (depth) is
/// kept for completeness but unused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapProjection {
    pub world_to_map: [f64; 9],
    pub scale: f64,
}

impl MapProjection {
    /// Projection with the standard 128-pixel tile scale.
    pub fn new(world_to_map: [f64; 9]) -> Self {
        Self {
            world_to_map,
            scale: TILE_SCALE,
        }
    }

    /// Unscaled tile-plane position of a world coordinate.
    pub fn unscaled(&self, world: WorldCoords) -> (f64, f64) {
        let v = world.as_vector();
        let m = &self.world_to_map;
        let x = m[0] * v[0] + m[1] * v[1] + m[2] * v[2];
        let y = m[3] * v[0] + m[4] * v[1] + m[5] * v[2];
        (x, y)
    }
}

/// Lazy, restartable walk over every tile of an inclusive range.
///
/// Yields row-major: all `x` for the lowest `y` first, stepping by the
/// zoom stride on both axes.
#[derive(Debug, Clone)]
pub struct TileRange {
    from: TileCoords,
    to: TileCoords,
    stride: i32,
    next: Option<TileCoords>,
}

impl TileRange {
    /// Create a range; `from` must be component-wise `<= to`.
    pub fn new(from: TileCoords, to: TileCoords, stride: i32) -> Self {
        let next = if from.x <= to.x && from.y <= to.y {
            Some(from)
        } else {
            None
        };
        Self {
            from,
            to,
            stride: stride.max(1),
            next,
        }
    }

    /// Number of tiles along the x axis.
    pub fn columns(&self) -> i64 {
        Self::span(self.from.x, self.to.x, self.stride)
    }

    /// Number of tiles along the y axis.
    pub fn rows(&self) -> i64 {
        Self::span(self.from.y, self.to.y, self.stride)
    }

    fn span(from: i32, to: i32, stride: i32) -> i64 {
        if to < from {
            0
        } else {
            (to as i64 - from as i64) / stride as i64 + 1
        }
    }

    fn remaining(&self) -> usize {
        match self.next {
            None => 0,
            Some(cur) => {
                let columns = self.columns();
                let rows_left = Self::span(cur.y, self.to.y, self.stride);
                let in_row = Self::span(cur.x, self.to.x, self.stride);
                ((rows_left - 1) * columns + in_row) as usize
            }
        }
    }
}

impl Iterator for TileRange {
    type Item = TileCoords;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        let next_x = current.x as i64 + self.stride as i64;
        self.next = if next_x <= self.to.x as i64 {
            Some(TileCoords::new(next_x as i32, current.y))
        } else {
            let next_y = current.y as i64 + self.stride as i64;
            if next_y <= self.to.y as i64 {
                Some(TileCoords::new(self.from.x, next_y as i32))
            } else {
                None
            }
        };

        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileRange {}
