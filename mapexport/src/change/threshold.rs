//! Change detection by pixel difference against the last kept snapshot.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::RgbaImage;
use tracing::{debug, warn};

use super::ChangeDetector;
use crate::addressing::local_export_dir;
use crate::export::ExportConfig;
use crate::snapshot::{latest_kept_instant, Snapshot};

/// Fraction of changed pixels that makes a tile count as changed.
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.1;

/// Compares downloaded tiles against the last kept snapshot.
///
/// The export is changed when any single tile has a changed-pixel fraction
/// of at least `threshold`. A tile without a counterpart in the baseline,
/// or one that cannot be decoded, counts as fully changed.
#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    data_root: PathBuf,
    threshold: f64,
}

impl ThresholdDetector {
    /// `threshold` is clamped to `0.0..=1.0`.
    pub fn new(data_root: PathBuf, threshold: f64) -> Self {
        Self {
            data_root,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Most recent kept snapshot of the export's map.
    pub fn latest_kept_instant(&self, config: &ExportConfig) -> Option<DateTime<Utc>> {
        latest_kept_instant(&self.data_root, config)
    }

    fn tile_changed(&self, baseline_dir: &Path, file: &Path) -> bool {
        let Some(name) = file.file_name() else {
            return true;
        };
        let previous_file = baseline_dir.join(name);
        if !previous_file.exists() {
            return true;
        }

        let Some(current) = load_rgba(file) else {
            return true;
        };
        let Some(previous) = load_rgba(&previous_file) else {
            return true;
        };

        let fraction = changed_fraction(&previous, &current);
        debug!(
            tile = %file.display(),
            fraction,
            threshold = self.threshold,
            "Compared tile against baseline"
        );
        fraction >= self.threshold
    }
}

fn load_rgba(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_rgba8()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read image");
            None
        }
    }
}

/// Fraction of pixels whose raw RGBA value differs.
///
/// Images of different dimensions are entirely changed.
pub fn changed_fraction(from: &RgbaImage, to: &RgbaImage) -> f64 {
    if from.dimensions() != to.dimensions() {
        return 1.0;
    }

    let total = to.width() as u64 * to.height() as u64;
    if total == 0 {
        return 0.0;
    }

    let changed = from
        .pixels()
        .zip(to.pixels())
        .filter(|(a, b)| a != b)
        .count() as u64;

    changed as f64 / total as f64
}

impl ChangeDetector for ThresholdDetector {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn is_changed(
        &self,
        config: &ExportConfig,
        baseline: Option<DateTime<Utc>>,
        snapshot: &Snapshot,
    ) -> bool {
        let Some(since) = baseline else {
            return !snapshot.is_empty();
        };

        let baseline_dir = local_export_dir(&self.data_root, config, since);
        snapshot
            .tiles
            .values()
            .any(|file| self.tile_changed(&baseline_dir, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::local_tile_file;
    use crate::coord::TileCoords;
    use crate::export::MapId;
    use chrono::TimeZone;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn config() -> ExportConfig {
        ExportConfig::from_tiles(
            "spawn",
            MapId::new("world", "flat", "flat"),
            0,
            TileCoords::new(0, 0),
            TileCoords::new(0, 0),
        )
        .unwrap()
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    /// 10×10 red tile with the first `changed` pixels blue.
    fn tile_with_changes(changed: u32) -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, y| if y * 10 + x < changed { BLUE } else { RED })
    }

    fn write_snapshot(root: &Path, instant: DateTime<Utc>, img: &RgbaImage) -> Snapshot {
        let tile = TileCoords::new(0, 0);
        let path = local_tile_file(root, &config(), instant, tile);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        img.save(&path).unwrap();

        let mut snapshot = Snapshot::new(instant, path.parent().unwrap().to_path_buf());
        snapshot.tiles.insert(tile, path);
        snapshot
    }

    #[test]
    fn test_changed_fraction() {
        let a = tile_with_changes(0);
        let b = tile_with_changes(25);
        assert_eq!(changed_fraction(&a, &b), 0.25);
        assert_eq!(changed_fraction(&a, &a), 0.0);
        assert_eq!(changed_fraction(&a, &RgbaImage::new(5, 5)), 1.0);
    }

    #[test]
    fn test_no_baseline_is_changed() {
        let temp = tempfile::TempDir::new().unwrap();
        let detector = ThresholdDetector::new(temp.path().to_path_buf(), 0.1);
        let snapshot = write_snapshot(temp.path(), at(0), &tile_with_changes(0));

        assert_eq!(detector.latest_kept_instant(&config()), Some(at(0)));
        assert!(detector.is_changed(&config(), None, &snapshot));
    }

    #[test]
    fn test_verdict_matches_threshold() {
        let temp = tempfile::TempDir::new().unwrap();
        write_snapshot(temp.path(), at(0), &tile_with_changes(0));
        let snapshot = write_snapshot(temp.path(), at(1), &tile_with_changes(25));

        let at_fraction = ThresholdDetector::new(temp.path().to_path_buf(), 0.25);
        assert!(at_fraction.is_changed(&config(), Some(at(0)), &snapshot));

        let above_fraction = ThresholdDetector::new(temp.path().to_path_buf(), 0.3);
        assert!(!above_fraction.is_changed(&config(), Some(at(0)), &snapshot));
    }

    #[test]
    fn test_missing_baseline_tile_is_changed() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(local_export_dir(temp.path(), &config(), at(0))).unwrap();
        let snapshot = write_snapshot(temp.path(), at(1), &tile_with_changes(0));

        let detector = ThresholdDetector::new(temp.path().to_path_buf(), 0.9);
        assert!(detector.is_changed(&config(), Some(at(0)), &snapshot));
    }

    #[test]
    fn test_undecodable_tile_is_changed() {
        let temp = tempfile::TempDir::new().unwrap();
        write_snapshot(temp.path(), at(0), &tile_with_changes(0));
        let snapshot = write_snapshot(temp.path(), at(1), &tile_with_changes(0));
        std::fs::write(snapshot.tiles.values().next().unwrap(), b"not a png").unwrap();

        let detector = ThresholdDetector::new(temp.path().to_path_buf(), 0.9);
        assert!(detector.is_changed(&config(), Some(at(0)), &snapshot));
    }

    #[test]
    fn test_threshold_clamped() {
        let detector = ThresholdDetector::new(PathBuf::from("/tmp"), 4.0);
        assert_eq!(detector.threshold(), 1.0);
    }
}
