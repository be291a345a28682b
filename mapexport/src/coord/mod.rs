//! Coordinate conversion module
//!
//! Maps in-world block positions onto the live map's tile grid and aligns
//! tile coordinates to a zoom level's stride.
//!
//! Tile `x` grows with the map's first projected axis. Tile `y` grows in the
//! opposite direction of image rows, and a tile is numbered by its far edge,
//! which is why the projection floors `x` but ceils `y` after a one-tile
//! offset.

mod types;

pub use types::{
    MapProjection, TileCoords, TileGroupCoords, TileRange, WorldCoords, MAX_ZOOM, SEA_LEVEL_Y,
    TILE_GROUP_SHIFT, TILE_GROUP_SIZE, TILE_SCALE,
};

/// Quotients closer than this to an integer are treated as that integer.
///
/// Server projections carry rounding noise (`-2.4e-16` instead of `0`) that
/// would otherwise push exact tile boundaries to the neighbouring tile.
const SNAP_EPSILON: f64 = 1e-9;

/// Tile-coordinate step between neighbouring tiles at `zoom`.
#[inline]
pub fn zoom_stride(zoom: u8) -> i32 {
    1 << zoom
}

#[inline]
fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < SNAP_EPSILON {
        rounded
    } else {
        value
    }
}

/// Converts a world position to the tile containing it at `zoom`.
///
/// # Arguments
///
/// * `world` - In-world block coordinates
/// * `projection` - The map layer's world-to-map transform
/// * `zoom` - Zoom-out level, 0 is fully zoomed in
#[inline]
pub fn project_world_to_tile(world: WorldCoords, projection: &MapProjection, zoom: u8) -> TileCoords {
    let stride = zoom_stride(zoom);
    let step = stride as f64;
    let (unscaled_x, unscaled_y) = projection.unscaled(world);

    // Float-to-int casts saturate, keeping far-off positions in range
    let tile_x = (snap(unscaled_x / projection.scale / step).floor() * step) as i32;
    let tile_y = (snap((unscaled_y / projection.scale - 1.0) / step).ceil() * step) as i32;

    TileCoords::new(tile_x, tile_y)
}

/// Aligns both components down to a multiple of the zoom stride.
#[inline]
pub fn floor_to_zoom(coord: TileCoords, zoom: u8) -> TileCoords {
    let stride = zoom_stride(zoom);
    TileCoords::new(
        coord.x.div_euclid(stride) * stride,
        coord.y.div_euclid(stride) * stride,
    )
}

#[inline]
fn ceil_aligned(v: i32, stride: i64) -> i64 {
    (i64::from(v) + stride - 1).div_euclid(stride) * stride
}

/// Aligns both components up to a multiple of the zoom stride.
///
/// Returns `None` when the aligned value does not fit in an `i32`.
pub fn checked_ceil_to_zoom(coord: TileCoords, zoom: u8) -> Option<TileCoords> {
    let stride = i64::from(zoom_stride(zoom));
    let ceil = |v: i32| i32::try_from(ceil_aligned(v, stride)).ok();
    Some(TileCoords::new(ceil(coord.x)?, ceil(coord.y)?))
}

/// Aligns both components up to a multiple of the zoom stride.
///
/// Values past the last aligned `i32` clamp to it.
#[inline]
pub fn ceil_to_zoom(coord: TileCoords, zoom: u8) -> TileCoords {
    let stride = i64::from(zoom_stride(zoom));
    let last = i64::from(i32::MAX).div_euclid(stride) * stride;
    let ceil = |v: i32| ceil_aligned(v, stride).min(last) as i32;
    TileCoords::new(ceil(coord.x), ceil(coord.y))
}

/// The tile group containing a tile.
///
/// Arithmetic shift, so `-1` lands in group `-1` rather than `0`.
#[inline]
pub fn to_tile_group(coord: TileCoords) -> TileGroupCoords {
    TileGroupCoords::new(coord.x >> TILE_GROUP_SHIFT, coord.y >> TILE_GROUP_SHIFT)
}
