//! One export cycle: fetch, evaluate, then keep or discard.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::prune::prune;
use crate::addressing::{format_instant, local_combined_file};
use crate::change::ChangeDetector;
use crate::error::ExportError;
use crate::export::ExportConfig;
use crate::fetch::FetchOrchestrator;
use crate::mosaic::TileCombiner;
use crate::snapshot::{latest_kept_instant, remove_snapshot, unused_instant, Snapshot};

/// Where an export is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Fetching,
    Evaluating,
    Kept,
    Discarded,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Evaluating => "evaluating",
            CycleState::Kept => "kept",
            CycleState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// How a finished cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The snapshot was promoted.
    Kept {
        instant: DateTime<Utc>,
        tiles: usize,
        /// Mosaic path, when combining was enabled and succeeded.
        combined: Option<PathBuf>,
        pruned: usize,
    },
    /// Not enough change; nothing new was retained.
    Unchanged,
    /// No tile could be fetched.
    Empty,
}

impl CycleOutcome {
    pub fn is_kept(&self) -> bool {
        matches!(self, CycleOutcome::Kept { .. })
    }
}

/// Runs export cycles against one data directory.
///
/// Tracks the [`CycleState`] of every export it has seen.
pub struct CycleRunner {
    data_root: PathBuf,
    fetcher: FetchOrchestrator,
    detector: Box<dyn ChangeDetector>,
    combiner: TileCombiner,
    auto_combine: bool,
    retain: usize,
    states: Mutex<HashMap<String, CycleState>>,
}

impl CycleRunner {
    pub fn new(
        data_root: PathBuf,
        fetcher: FetchOrchestrator,
        detector: Box<dyn ChangeDetector>,
        auto_combine: bool,
        retain: usize,
    ) -> Self {
        Self {
            combiner: TileCombiner::new(data_root.clone()),
            data_root,
            fetcher,
            detector,
            auto_combine,
            retain,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn fetcher(&self) -> &FetchOrchestrator {
        &self.fetcher
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    /// Current state of the named export.
    pub fn state(&self, export: &str) -> CycleState {
        self.states.lock().get(export).copied().unwrap_or_default()
    }

    fn transition(&self, config: &ExportConfig, state: CycleState) {
        debug!(export = %config.name, state = %state, "Export state changed");
        self.states.lock().insert(config.name.clone(), state);
    }

    /// Run one cycle of `config`, snapshotting at `instant`.
    ///
    /// A cancelled cycle discards whatever it fetched and returns
    /// [`ExportError::Cancelled`].
    pub fn run(
        &self,
        config: &ExportConfig,
        instant: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome, ExportError> {
        let result = self.run_inner(config, instant, cancel);
        self.transition(config, CycleState::Idle);
        result
    }

    fn run_inner(
        &self,
        config: &ExportConfig,
        instant: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome, ExportError> {
        if self.detector.precheck(config) == Some(false) {
            self.transition(config, CycleState::Discarded);
            info!(export = %config.name, "No tile group changed, skipping download");
            return Ok(CycleOutcome::Unchanged);
        }

        // Only kept snapshots count as history
        let baseline = latest_kept_instant(&self.data_root, config);
        let instant = unused_instant(&self.data_root, config, instant);

        self.transition(config, CycleState::Fetching);
        let snapshot = match self.fetcher.fetch_all(config, instant, cancel) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.discard(config, instant, baseline);
                return Err(e);
            }
        };

        if snapshot.is_empty() {
            warn!(export = %config.name, "No tiles fetched, discarding snapshot");
            self.discard(config, instant, baseline);
            return Ok(CycleOutcome::Empty);
        }

        self.transition(config, CycleState::Evaluating);
        let changed = self.detector.is_changed(config, baseline, &snapshot);

        if cancel.is_cancelled() {
            self.discard(config, instant, baseline);
            return Err(ExportError::Cancelled);
        }

        if !changed {
            info!(
                export = %config.name,
                strategy = self.detector.name(),
                "Not enough change, discarding snapshot"
            );
            self.discard(config, instant, baseline);
            return Ok(CycleOutcome::Unchanged);
        }

        Ok(self.keep(config, &snapshot))
    }

    fn keep(&self, config: &ExportConfig, snapshot: &Snapshot) -> CycleOutcome {
        self.transition(config, CycleState::Kept);

        let combined = if self.auto_combine {
            self.combiner
                .combine_and_save(config, snapshot.instant)
                .then(|| local_combined_file(&self.data_root, config, snapshot.instant))
        } else {
            None
        };

        // Older snapshots go only once this one is complete
        let complete = snapshot.len() == config.tile_count();
        let pruned = if !complete || (self.auto_combine && combined.is_none()) {
            warn!(
                export = %config.name,
                tiles = snapshot.len(),
                expected = config.tile_count(),
                combined = combined.is_some(),
                "Snapshot incomplete, keeping older snapshots"
            );
            0
        } else {
            match prune(&self.data_root, config, self.retain, snapshot.instant) {
                Ok(removed) => removed.len(),
                Err(e) => {
                    warn!(export = %config.name, error = %e, "Could not prune old snapshots");
                    0
                }
            }
        };

        info!(
            export = %config.name,
            instant = %format_instant(snapshot.instant),
            tiles = snapshot.len(),
            combined = combined.is_some(),
            pruned,
            "Kept snapshot"
        );

        CycleOutcome::Kept {
            instant: snapshot.instant,
            tiles: snapshot.len(),
            combined,
            pruned,
        }
    }

    fn discard(
        &self,
        config: &ExportConfig,
        instant: DateTime<Utc>,
        baseline: Option<DateTime<Utc>>,
    ) {
        self.transition(config, CycleState::Discarded);
        if baseline.is_some_and(|kept| instant <= kept) {
            warn!(
                export = %config.name,
                instant = %format_instant(instant),
                "Refusing to delete a kept snapshot"
            );
            return;
        }
        if let Err(e) = remove_snapshot(&self.data_root, config, instant) {
            warn!(export = %config.name, error = %e, "Could not delete discarded snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{local_export_dir, remote_tile_path};
    use crate::change::{HashCache, ThresholdDetector};
    use crate::coord::TileCoords;
    use crate::export::MapId;
    use crate::http::tests::MockHttpClient;
    use crate::server::join_url;
    use chrono::TimeZone;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Arc;

    const BASE: &str = "http://localhost:8123";

    fn config() -> ExportConfig {
        ExportConfig::from_tiles(
            "spawn",
            MapId::new("world", "flat", "flat"),
            0,
            TileCoords::new(0, 0),
            TileCoords::new(1, 0),
        )
        .unwrap()
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, minute, 0).unwrap()
    }

    fn png(color: Rgba<u8>) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(128, 128, color)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn serve(mock: &MockHttpClient, color: Rgba<u8>) {
        for tile in config().tiles() {
            mock.insert(join_url(BASE, &remote_tile_path(&config(), tile)), png(color));
        }
    }

    fn threshold_runner(root: &Path, mock: Arc<MockHttpClient>, retain: usize) -> CycleRunner {
        let fetcher = FetchOrchestrator::new(mock, BASE, root.to_path_buf(), 1);
        let detector = Box::new(ThresholdDetector::new(root.to_path_buf(), 0.1));
        CycleRunner::new(root.to_path_buf(), fetcher, detector, true, retain)
    }

    #[test]
    fn test_first_cycle_kept_and_combined() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        serve(&mock, Rgba([10, 20, 30, 255]));
        let runner = threshold_runner(temp.path(), mock, 0);

        let outcome = runner.run(&config(), at(0), &CancellationToken::new()).unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Kept {
                instant: at(0),
                tiles: 2,
                combined: Some(local_combined_file(temp.path(), &config(), at(0))),
                pruned: 0,
            }
        );
        assert_eq!(runner.state("spawn"), CycleState::Idle);
    }

    #[test]
    fn test_unchanged_snapshot_discarded_and_baseline_kept() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        serve(&mock, Rgba([10, 20, 30, 255]));
        let runner = threshold_runner(temp.path(), mock.clone(), 0);
        let cancel = CancellationToken::new();

        runner.run(&config(), at(0), &cancel).unwrap();
        let second = runner.run(&config(), at(1), &cancel).unwrap();

        assert_eq!(second, CycleOutcome::Unchanged);
        assert!(!local_export_dir(temp.path(), &config(), at(1)).exists());
        assert_eq!(latest_kept_instant(temp.path(), &config()), Some(at(0)));

        serve(&mock, Rgba([200, 0, 0, 255]));
        let third = runner.run(&config(), at(2), &cancel).unwrap();
        assert!(third.is_kept());
    }

    #[test]
    fn test_retain_prunes_previous_snapshot() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        let runner = threshold_runner(temp.path(), mock.clone(), 1);
        let cancel = CancellationToken::new();

        serve(&mock, Rgba([0, 0, 0, 255]));
        runner.run(&config(), at(0), &cancel).unwrap();
        serve(&mock, Rgba([255, 255, 255, 255]));
        let outcome = runner.run(&config(), at(1), &cancel).unwrap();

        assert!(matches!(outcome, CycleOutcome::Kept { pruned: 1, .. }));
        assert!(!local_export_dir(temp.path(), &config(), at(0)).exists());
        assert!(!local_combined_file(temp.path(), &config(), at(0)).exists());
        assert!(local_combined_file(temp.path(), &config(), at(1)).exists());
    }

    #[test]
    fn test_rerun_in_same_second_keeps_existing_snapshot() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        serve(&mock, Rgba([10, 20, 30, 255]));
        let runner = threshold_runner(temp.path(), mock, 0);
        let cancel = CancellationToken::new();

        assert!(runner.run(&config(), at(0), &cancel).unwrap().is_kept());
        let second = runner.run(&config(), at(0), &cancel).unwrap();

        assert_eq!(second, CycleOutcome::Unchanged);
        assert!(local_export_dir(temp.path(), &config(), at(0)).exists());
        assert!(local_combined_file(temp.path(), &config(), at(0)).exists());
        assert_eq!(latest_kept_instant(temp.path(), &config()), Some(at(0)));
    }

    #[test]
    fn test_rerun_in_same_second_keeps_change_under_later_instant() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        let runner = threshold_runner(temp.path(), mock.clone(), 0);
        let cancel = CancellationToken::new();

        serve(&mock, Rgba([0, 0, 0, 255]));
        runner.run(&config(), at(0), &cancel).unwrap();
        serve(&mock, Rgba([255, 255, 255, 255]));
        let second = runner.run(&config(), at(0), &cancel).unwrap();

        let next = at(0) + chrono::Duration::seconds(1);
        assert!(matches!(second, CycleOutcome::Kept { instant, .. } if instant == next));
        assert!(local_export_dir(temp.path(), &config(), at(0)).exists());
        assert!(local_export_dir(temp.path(), &config(), next).exists());
    }

    #[test]
    fn test_partial_snapshot_does_not_prune() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        let runner = threshold_runner(temp.path(), mock.clone(), 1);
        let cancel = CancellationToken::new();

        serve(&mock, Rgba([0, 0, 0, 255]));
        runner.run(&config(), at(0), &cancel).unwrap();

        serve(&mock, Rgba([255, 255, 255, 255]));
        mock.remove(&join_url(BASE, &remote_tile_path(&config(), TileCoords::new(1, 0))));
        let outcome = runner.run(&config(), at(1), &cancel).unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Kept {
                instant: at(1),
                tiles: 1,
                combined: None,
                pruned: 0,
            }
        );
        assert!(local_export_dir(temp.path(), &config(), at(0)).exists());
        assert!(local_combined_file(temp.path(), &config(), at(0)).exists());
    }

    #[test]
    fn test_no_tiles_is_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = threshold_runner(temp.path(), Arc::new(MockHttpClient::new()), 0);

        let outcome = runner.run(&config(), at(0), &CancellationToken::new()).unwrap();

        assert_eq!(outcome, CycleOutcome::Empty);
        assert!(!local_export_dir(temp.path(), &config(), at(0)).exists());
    }

    #[test]
    fn test_cancelled_cycle_discards_snapshot() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        serve(&mock, Rgba([1, 2, 3, 255]));
        let runner = threshold_runner(temp.path(), mock, 0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner.run(&config(), at(0), &cancel);

        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert_eq!(latest_kept_instant(temp.path(), &config()), None);
    }

    #[test]
    fn test_hash_precheck_skips_download() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        serve(&mock, Rgba([1, 2, 3, 255]));
        mock.insert(format!("{}/tiles/world/flat/0_0.hash", BASE), "h1");

        let fetcher = FetchOrchestrator::new(mock.clone(), BASE, temp.path().to_path_buf(), 1);
        let detector = Box::new(HashCache::new(mock.clone(), BASE, temp.path().to_path_buf()));
        let runner = CycleRunner::new(temp.path().to_path_buf(), fetcher, detector, false, 0);
        let cancel = CancellationToken::new();

        assert!(runner.run(&config(), at(0), &cancel).unwrap().is_kept());

        let before = mock.requests().len();
        assert_eq!(runner.run(&config(), at(1), &cancel).unwrap(), CycleOutcome::Unchanged);
        // Only the hash was requested
        assert_eq!(mock.requests().len(), before + 1);
    }
}
