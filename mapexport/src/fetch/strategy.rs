//! Fetch strategies for the tiles of one snapshot.
//!
//! Sequential fetching suits a slow or fragile map server; the parallel
//! strategy spreads tiles over a bounded rayon pool.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::state::{FetchJob, FetchState, TileResult};
use crate::error::FetchError;
use crate::http::HttpClient;

/// Strategy for fetching a batch of tiles.
pub trait FetchStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Fetch every job, returning once all of them have settled.
    ///
    /// Jobs not yet started when `cancel` fires are skipped.
    fn execute(
        &self,
        jobs: &[FetchJob],
        client: &dyn HttpClient,
        cancel: &CancellationToken,
    ) -> FetchState;
}

/// Fetch one tile, reporting how it ended.
///
/// Failed or empty downloads leave no file behind.
pub fn fetch_tile(client: &dyn HttpClient, url: &str, dest: &Path) -> TileResult {
    match client.download(url, dest) {
        Ok(bytes) => {
            debug!(url = %url, path = %dest.display(), bytes, "Fetched tile");
            TileResult::Written(bytes)
        }
        Err(FetchError::Empty { .. }) => {
            warn!(url = %url, "Tile download returned 0 bytes");
            discard_partial(dest);
            TileResult::Empty
        }
        Err(e @ FetchError::InvalidUrl { .. }) => {
            error!(url = %url, error = %e, "Malformed tile URL");
            TileResult::Failed
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Tile download failed");
            discard_partial(dest);
            TileResult::Failed
        }
    }
}

fn discard_partial(dest: &Path) {
    if dest.exists() {
        if let Err(e) = fs::remove_file(dest) {
            warn!(path = %dest.display(), error = %e, "Could not remove partial tile");
        }
    }
}

fn run_job(job: &FetchJob, client: &dyn HttpClient, cancel: &CancellationToken) -> TileResult {
    if cancel.is_cancelled() {
        return TileResult::Skipped;
    }
    fetch_tile(client, &job.url, &job.dest)
}

/// Sequential fetch strategy.
///
/// Fetches tiles one at a time in enumeration order.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl FetchStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn execute(
        &self,
        jobs: &[FetchJob],
        client: &dyn HttpClient,
        cancel: &CancellationToken,
    ) -> FetchState {
        let mut state = FetchState::new(jobs.len());
        for job in jobs {
            state.record(job, run_job(job, client, cancel));
        }
        state
    }
}

/// Parallel fetch strategy.
///
/// Runs tile downloads on a dedicated rayon pool so that at most
/// `concurrency` requests hit the map server at once.
#[derive(Debug)]
pub struct ParallelStrategy {
    /// Maximum number of concurrent downloads.
    pub concurrency: usize,
}

impl ParallelStrategy {
    /// Create a new parallel strategy (minimum concurrency 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self::new(8)
    }
}

impl FetchStrategy for ParallelStrategy {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn execute(
        &self,
        jobs: &[FetchJob],
        client: &dyn HttpClient,
        cancel: &CancellationToken,
    ) -> FetchState {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|i| format!("tile-fetch-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "Could not start fetch pool, fetching sequentially");
                return SequentialStrategy.execute(jobs, client, cancel);
            }
        };

        let results: Vec<TileResult> = pool.install(|| {
            jobs.par_iter()
                .map(|job| run_job(job, client, cancel))
                .collect()
        });

        let mut state = FetchState::new(jobs.len());
        for (job, result) in jobs.iter().zip(results) {
            state.record(job, result);
        }
        state
    }
}

/// Pick the strategy for a configured concurrency.
pub fn strategy_for(concurrency: usize) -> Box<dyn FetchStrategy> {
    if concurrency <= 1 {
        Box::new(SequentialStrategy::new())
    } else {
        Box::new(ParallelStrategy::new(concurrency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoords;
    use crate::http::tests::MockHttpClient;

    fn jobs(dir: &Path, count: i32) -> Vec<FetchJob> {
        (0..count)
            .map(|x| FetchJob {
                tile: TileCoords::new(x, 0),
                url: format!("http://localhost/tiles/{}_0.png", x),
                dest: dir.join(format!("{}_0.png", x)),
            })
            .collect()
    }

    fn mock_with(count: i32) -> MockHttpClient {
        let mock = MockHttpClient::new();
        for x in 0..count {
            mock.insert(format!("http://localhost/tiles/{}_0.png", x), vec![1u8; 16]);
        }
        mock
    }

    #[test]
    fn test_parallel_strategy_min_concurrency() {
        assert_eq!(ParallelStrategy::new(0).concurrency, 1);
        assert_eq!(strategy_for(1).name(), "sequential");
        assert_eq!(strategy_for(4).name(), "parallel");
    }

    #[test]
    fn test_sequential_records_failures() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = mock_with(3);
        mock.remove("http://localhost/tiles/1_0.png");

        let state = SequentialStrategy.execute(&jobs(temp.path(), 3), &mock, &CancellationToken::new());

        assert_eq!(state.written.len(), 2);
        assert_eq!(state.failed, vec![TileCoords::new(1, 0)]);
        assert!(!temp.path().join("1_0.png").exists());
    }

    #[test]
    fn test_parallel_settles_every_job() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = mock_with(20);

        let state = ParallelStrategy::new(4).execute(&jobs(temp.path(), 20), &mock, &CancellationToken::new());

        assert_eq!(state.written.len(), 20);
        assert_eq!(state.bytes, 20 * 16);
        assert!(state.is_complete());
    }

    #[test]
    fn test_empty_tile_is_not_written() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = mock_with(1);
        mock.insert("http://localhost/tiles/0_0.png", Vec::new());

        let state = SequentialStrategy.execute(&jobs(temp.path(), 1), &mock, &CancellationToken::new());

        assert!(state.written.is_empty());
        assert_eq!(state.empty, vec![TileCoords::new(0, 0)]);
        assert!(!temp.path().join("0_0.png").exists());
    }

    #[test]
    fn test_cancelled_jobs_are_skipped() {
        let temp = tempfile::TempDir::new().unwrap();
        let mock = mock_with(5);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let state = ParallelStrategy::new(2).execute(&jobs(temp.path(), 5), &mock, &cancel);

        assert_eq!(state.skipped, 5);
        assert!(mock.requests().is_empty());
    }
}
