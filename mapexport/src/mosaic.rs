//! Mosaic assembly.
//!
//! Stitches every tile of a snapshot into one image. Tile `x` maps to
//! pixel columns left to right; tile `y` grows upwards, so the row with the
//! highest `y` is drawn at the top of the canvas.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};
use tracing::{debug, error, info};

use crate::addressing::{local_combined_file, local_tile_file};
use crate::error::MosaicError;
use crate::export::ExportConfig;

/// Edge length of one server tile in pixels.
pub const TILE_SIZE: u32 = 128;

/// Builds and saves mosaics from local snapshots.
#[derive(Debug, Clone)]
pub struct TileCombiner {
    data_root: PathBuf,
}

impl TileCombiner {
    pub fn new(data_root: PathBuf) -> Self {
        Self { data_root }
    }

    /// Assemble the snapshot taken at `instant` into one image.
    ///
    /// Every tile of the export must be present and decodable, otherwise
    /// nothing is returned.
    pub fn combine(
        &self,
        config: &ExportConfig,
        instant: DateTime<Utc>,
    ) -> Result<RgbaImage, MosaicError> {
        let range = config.tiles();
        let (columns, rows) = (range.columns(), range.rows());
        let (width, height) = canvas_size(columns, rows)?;
        let stride = config.stride();

        let mut canvas = RgbaImage::new(width, height);
        for tile in range {
            let path = local_tile_file(&self.data_root, config, instant, tile);
            let img = load_tile(&path)?;

            let px = ((tile.x - config.from.x) / stride) as i64 * TILE_SIZE as i64;
            let py = ((config.to.y - tile.y) / stride) as i64 * TILE_SIZE as i64;
            image::imageops::replace(&mut canvas, &img, px, py);
        }

        debug!(
            export = %config.name,
            width,
            height,
            "Combined tiles"
        );
        Ok(canvas)
    }

    /// Combine and write the mosaic next to its snapshot directory.
    ///
    /// The image is written to a temporary file first and moved into place,
    /// so a failed save leaves no partial mosaic behind.
    pub fn save(&self, config: &ExportConfig, instant: DateTime<Utc>) -> Result<PathBuf, MosaicError> {
        let canvas = self.combine(config, instant)?;
        let dest = local_combined_file(&self.data_root, config, instant);
        let tmp = dest.with_extension("png.part");

        if let Err(source) = canvas.save_with_format(&tmp, ImageFormat::Png) {
            let _ = fs::remove_file(&tmp);
            return Err(MosaicError::Save { path: dest, source });
        }
        if let Err(source) = fs::rename(&tmp, &dest) {
            let _ = fs::remove_file(&tmp);
            return Err(MosaicError::Rename { path: dest, source });
        }

        Ok(dest)
    }

    /// Like [`save`](Self::save), logging instead of returning the error.
    pub fn combine_and_save(&self, config: &ExportConfig, instant: DateTime<Utc>) -> bool {
        match self.save(config, instant) {
            Ok(path) => {
                info!(export = %config.name, path = %path.display(), "Saved combined image");
                true
            }
            Err(e) => {
                error!(export = %config.name, error = %e, "Could not combine tiles");
                false
            }
        }
    }
}

fn canvas_size(columns: i64, rows: i64) -> Result<(u32, u32), MosaicError> {
    let too_large = || MosaicError::TooLarge { columns, rows };
    let width = u32::try_from(columns * TILE_SIZE as i64).map_err(|_| too_large())?;
    let height = u32::try_from(rows * TILE_SIZE as i64).map_err(|_| too_large())?;
    (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or_else(too_large)?;
    Ok((width, height))
}

fn load_tile(path: &Path) -> Result<RgbaImage, MosaicError> {
    let img = image::open(path)
        .map_err(|source| MosaicError::Tile {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();

    if img.dimensions() != (TILE_SIZE, TILE_SIZE) {
        return Err(MosaicError::TileSize {
            path: path.to_path_buf(),
            width: img.width(),
            height: img.height(),
            expected: TILE_SIZE,
        });
    }
    Ok(img)
}
