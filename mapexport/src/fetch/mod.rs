//! Tile download orchestration.
//!
//! The [`FetchOrchestrator`] turns an export's tile range into download
//! jobs, hands them to a [`FetchStrategy`] and collects the tiles that made
//! it to disk into a [`Snapshot`]. Failed tiles are left out; retrying is up
//! to the scheduler.

mod state;
mod strategy;

pub use state::{FetchJob, FetchState, TileResult};
pub use strategy::{fetch_tile, strategy_for, FetchStrategy, ParallelStrategy, SequentialStrategy};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::addressing::{local_export_dir, local_tile_file, remote_tile_path};
use crate::coord::TileRange;
use crate::error::ExportError;
use crate::export::ExportConfig;
use crate::http::HttpClient;
use crate::server::join_url;
use crate::snapshot::Snapshot;

/// Downloads the tiles of an export into time-stamped snapshot directories.
pub struct FetchOrchestrator {
    client: Arc<dyn HttpClient>,
    base_url: String,
    data_root: PathBuf,
    strategy: Box<dyn FetchStrategy>,
}

impl FetchOrchestrator {
    /// Create an orchestrator fetching up to `concurrency` tiles at once.
    pub fn new(
        client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        data_root: PathBuf,
        concurrency: usize,
    ) -> Self {
        Self::with_strategy(client, base_url, data_root, strategy_for(concurrency))
    }

    pub fn with_strategy(
        client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        data_root: PathBuf,
        strategy: Box<dyn FetchStrategy>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            data_root,
            strategy,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Every tile of the export, row-major from `from` to `to`.
    pub fn enumerate(config: &ExportConfig) -> TileRange {
        config.tiles()
    }

    /// Fetch one tile from its server-relative path into `local`.
    pub fn fetch_tile(&self, remote_path: &str, local: &Path) -> bool {
        let url = join_url(&self.base_url, remote_path);
        matches!(
            fetch_tile(self.client.as_ref(), &url, local),
            TileResult::Written(_)
        )
    }

    /// Fetch every tile of the export into a new snapshot at `instant`.
    ///
    /// Waits for the whole batch to settle. Returns
    /// [`ExportError::Cancelled`] if `cancel` fired before the batch
    /// finished; whatever was written is left for the caller to discard.
    pub fn fetch_all(
        &self,
        config: &ExportConfig,
        instant: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Snapshot, ExportError> {
        let jobs: Vec<FetchJob> = Self::enumerate(config)
            .map(|tile| FetchJob {
                tile,
                url: join_url(&self.base_url, &remote_tile_path(config, tile)),
                dest: local_tile_file(&self.data_root, config, instant, tile),
            })
            .collect();

        debug!(
            export = %config.name,
            tiles = jobs.len(),
            strategy = self.strategy.name(),
            "Fetching tiles"
        );

        let state = self.strategy.execute(&jobs, self.client.as_ref(), cancel);

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        if !state.is_complete() {
            warn!(
                export = %config.name,
                missing = state.missing(),
                failed = state.failed.len(),
                empty = state.empty.len(),
                "Some tiles could not be fetched"
            );
        }

        info!(
            export = %config.name,
            world = %config.map.world,
            map = %config.map.map,
            fetched = state.written.len(),
            total = state.total,
            bytes = state.bytes,
            "Fetched snapshot"
        );

        let mut snapshot = Snapshot::new(instant, local_export_dir(&self.data_root, config, instant));
        snapshot.tiles.extend(state.written);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoords;
    use crate::export::MapId;
    use crate::http::tests::MockHttpClient;
    use chrono::TimeZone;

    const BASE: &str = "http://localhost:8123";

    fn config() -> ExportConfig {
        ExportConfig::from_tiles(
            "spawn",
            MapId::new("world", "flat", "flat"),
            1,
            TileCoords::new(0, 0),
            TileCoords::new(2, 2),
        )
        .unwrap()
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn serve_all(mock: &MockHttpClient) {
        for tile in config().tiles() {
            mock.insert(
                join_url(BASE, &remote_tile_path(&config(), tile)),
                vec![7u8; 32],
            );
        }
    }

    #[test]
    fn test_enumerate_row_major() {
        let tiles: Vec<_> = FetchOrchestrator::enumerate(&config()).collect();
        assert_eq!(
            tiles,
            vec![
                TileCoords::new(0, 0),
                TileCoords::new(2, 0),
                TileCoords::new(0, 2),
                TileCoords::new(2, 2),
            ]
        );
    }

    #[test]
    fn test_fetch_all_collects_written_tiles() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        serve_all(&mock);
        mock.remove(&format!("{}/tiles/world/flat/0_0/z_2_2.png", BASE));

        let orchestrator = FetchOrchestrator::new(mock.clone(), BASE, temp.path().to_path_buf(), 2);
        let snapshot = orchestrator
            .fetch_all(&config(), instant(), &CancellationToken::new())
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot.tiles.contains_key(&TileCoords::new(2, 2)));
        assert_eq!(
            snapshot.tiles[&TileCoords::new(0, 2)],
            temp.path().join("exports/world/flat/20240301T080000Z/z_0_2.png")
        );
        assert!(snapshot.tiles.values().all(|p| p.exists()));
    }

    #[test]
    fn test_fetch_all_cancelled() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        serve_all(&mock);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let orchestrator = FetchOrchestrator::new(mock, BASE, temp.path().to_path_buf(), 1);
        let result = orchestrator.fetch_all(&config(), instant(), &cancel);

        assert!(matches!(result, Err(ExportError::Cancelled)));
    }

    #[test]
    fn test_fetch_single_tile() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        mock.insert(format!("{}/tiles/world/flat/0_0/1_1.png", BASE), vec![1u8; 4]);
        let orchestrator = FetchOrchestrator::new(mock, BASE, temp.path().to_path_buf(), 1);

        let dest = temp.path().join("single/1_1.png");
        assert!(orchestrator.fetch_tile("tiles/world/flat/0_0/1_1.png", &dest));
        assert!(!orchestrator.fetch_tile("tiles/world/flat/0_0/9_9.png", &dest));
    }
}
