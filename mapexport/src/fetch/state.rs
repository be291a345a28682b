//! Bookkeeping for one batch of tile fetches.

use std::path::PathBuf;

use crate::coord::TileCoords;

/// One tile to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub tile: TileCoords,
    pub url: String,
    pub dest: PathBuf,
}

/// How a single tile fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileResult {
    /// Written with this many bytes.
    Written(u64),
    /// The server answered with an empty body.
    Empty,
    /// Connection, status or storage failure.
    Failed,
    /// Not attempted because the batch was cancelled.
    Skipped,
}

/// Outcome of a batch, in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    /// Total number of tiles in the batch.
    pub total: usize,
    /// Tiles written to disk.
    pub written: Vec<(TileCoords, PathBuf)>,
    /// Total bytes written.
    pub bytes: u64,
    /// Tiles whose download failed.
    pub failed: Vec<TileCoords>,
    /// Tiles the server returned empty.
    pub empty: Vec<TileCoords>,
    /// Tiles skipped after cancellation.
    pub skipped: usize,
}

impl FetchState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, job: &FetchJob, result: TileResult) {
        match result {
            TileResult::Written(bytes) => {
                self.bytes += bytes;
                self.written.push((job.tile, job.dest.clone()));
            }
            TileResult::Empty => self.empty.push(job.tile),
            TileResult::Failed => self.failed.push(job.tile),
            TileResult::Skipped => self.skipped += 1,
        }
    }

    /// Every tile was written.
    pub fn is_complete(&self) -> bool {
        self.written.len() == self.total
    }

    /// Number of tiles that did not make it to disk.
    pub fn missing(&self) -> usize {
        self.total - self.written.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(x: i32) -> FetchJob {
        FetchJob {
            tile: TileCoords::new(x, 0),
            url: format!("http://localhost/{}.png", x),
            dest: PathBuf::from(format!("/tmp/{}.png", x)),
        }
    }

    #[test]
    fn test_record_results() {
        let mut state = FetchState::new(4);
        state.record(&job(0), TileResult::Written(10));
        state.record(&job(1), TileResult::Empty);
        state.record(&job(2), TileResult::Failed);
        state.record(&job(3), TileResult::Skipped);

        assert_eq!(state.bytes, 10);
        assert_eq!(state.written.len(), 1);
        assert_eq!(state.empty, vec![TileCoords::new(1, 0)]);
        assert_eq!(state.failed, vec![TileCoords::new(2, 0)]);
        assert_eq!(state.skipped, 1);
        assert_eq!(state.missing(), 3);
        assert!(!state.is_complete());
    }

    #[test]
    fn test_empty_batch_is_complete() {
        assert!(FetchState::new(0).is_complete());
    }
}
