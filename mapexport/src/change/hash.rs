//! Change detection from server-side tile-group hashes.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use super::ChangeDetector;
use crate::addressing::{local_hash_file, remote_hash_path};
use crate::coord::TileGroupCoords;
use crate::export::ExportConfig;
use crate::http::HttpClient;
use crate::server::join_url;
use crate::snapshot::Snapshot;

/// Local cache of the last hash seen for each tile group.
///
/// Every check fetches the current hash and writes it back to the cache,
/// whether or not the export is later kept, so the next cycle always
/// compares against the newest state of the server.
pub struct HashCache {
    client: Arc<dyn HttpClient>,
    base_url: String,
    data_root: PathBuf,
}

impl HashCache {
    pub fn new(client: Arc<dyn HttpClient>, base_url: impl Into<String>, data_root: PathBuf) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            data_root,
        }
    }

    /// Whether any tile group of the export changed since its last check.
    ///
    /// Every group is checked, so every cached hash advances.
    pub fn any_changed(&self, config: &ExportConfig) -> bool {
        let groups = config.tile_groups();
        let changed = groups
            .iter()
            .filter(|group| self.has_changed(config, **group))
            .count();

        debug!(
            export = %config.name,
            groups = groups.len(),
            changed,
            "Checked tile group hashes"
        );
        changed > 0
    }

    /// Whether one tile group changed since its last check.
    ///
    /// Missing cache or unknown remote hash both count as changed.
    pub fn has_changed(&self, config: &ExportConfig, group: TileGroupCoords) -> bool {
        let cached = self.cached_hash(config, group);
        let latest = self.latest_hash(config, group);

        match (cached, latest) {
            (Some(cached), Some(latest)) => cached != latest,
            _ => true,
        }
    }

    fn cached_hash(&self, config: &ExportConfig, group: TileGroupCoords) -> Option<Vec<u8>> {
        let path = local_hash_file(&self.data_root, config, group);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read stored hash");
                None
            }
        }
    }

    /// Fetch the current hash and store it as the new cached value.
    fn latest_hash(&self, config: &ExportConfig, group: TileGroupCoords) -> Option<Vec<u8>> {
        let url = join_url(&self.base_url, &remote_hash_path(config, group));
        match self.client.get(&url) {
            Ok(hash) => {
                self.save_hash(config, group, &hash);
                Some(hash)
            }
            Err(e) => {
                error!(url = %url, error = %e, "Could not download hash");
                None
            }
        }
    }

    fn save_hash(&self, config: &ExportConfig, group: TileGroupCoords, hash: &[u8]) {
        let path = local_hash_file(&self.data_root, config, group);
        let result = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&path, hash));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Could not save hash");
        }
    }
}

impl ChangeDetector for HashCache {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn precheck(&self, config: &ExportConfig) -> Option<bool> {
        Some(self.any_changed(config))
    }

    /// The verdict was already reached before downloading.
    fn is_changed(
        &self,
        _config: &ExportConfig,
        _baseline: Option<DateTime<Utc>>,
        snapshot: &Snapshot,
    ) -> bool {
        !snapshot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoords;
    use crate::export::MapId;
    use crate::http::tests::MockHttpClient;

    const BASE: &str = "http://localhost:8123";

    fn config() -> ExportConfig {
        // Spans groups 0_0 and 1_0
        ExportConfig::from_tiles(
            "spawn",
            MapId::new("world", "flat", "flat"),
            0,
            TileCoords::new(31, 0),
            TileCoords::new(32, 0),
        )
        .unwrap()
    }

    fn setup() -> (tempfile::TempDir, Arc<MockHttpClient>, HashCache) {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = Arc::new(MockHttpClient::new());
        let cache = HashCache::new(mock.clone(), BASE, temp.path().to_path_buf());
        (temp, mock, cache)
    }

    fn hash_url(group: &str) -> String {
        format!("{}/tiles/world/flat/{}.hash", BASE, group)
    }

    #[test]
    fn test_first_check_is_changed_then_identical_is_unchanged() {
        let (_temp, mock, cache) = setup();
        mock.insert(hash_url("0_0"), "abc");
        mock.insert(hash_url("1_0"), "def");

        assert!(cache.any_changed(&config()));
        assert!(!cache.any_changed(&config()));
    }

    #[test]
    fn test_changed_hash_detected_and_cache_advanced() {
        let (temp, mock, cache) = setup();
        let group = TileGroupCoords::new(1, 0);
        mock.insert(hash_url("1_0"), "v1");
        assert!(cache.has_changed(&config(), group));

        mock.insert(hash_url("1_0"), "v2");
        assert!(cache.has_changed(&config(), group));

        let stored = fs::read(local_hash_file(temp.path(), &config(), group)).unwrap();
        assert_eq!(stored, b"v2");
        assert!(!cache.has_changed(&config(), group));
    }

    #[test]
    fn test_every_group_is_checked() {
        let (_temp, mock, cache) = setup();
        mock.insert(hash_url("0_0"), "abc");
        mock.insert(hash_url("1_0"), "def");

        cache.any_changed(&config());

        let requests = mock.requests();
        assert!(requests.contains(&hash_url("0_0")));
        assert!(requests.contains(&hash_url("1_0")));
    }

    #[test]
    fn test_network_failure_assumes_changed() {
        let (_temp, mock, cache) = setup();
        let group = TileGroupCoords::new(0, 0);
        mock.insert(hash_url("0_0"), "abc");
        assert!(cache.has_changed(&config(), group));

        mock.remove(&hash_url("0_0"));
        assert!(cache.has_changed(&config(), group));
    }

    #[test]
    fn test_precheck_reports_verdict() {
        let (_temp, mock, cache) = setup();
        mock.insert(hash_url("0_0"), "abc");
        mock.insert(hash_url("1_0"), "def");

        assert_eq!(cache.precheck(&config()), Some(true));
        assert_eq!(cache.precheck(&config()), Some(false));
    }
}
