//! Change detection between export cycles.
//!
//! Two interchangeable strategies decide whether a new snapshot is worth
//! keeping:
//!
//! - [`HashCache`] compares the server's per-tile-group change hashes with
//!   locally cached copies. It can decide before any tile is downloaded.
//! - [`ThresholdDetector`] diffs each downloaded tile against the same tile
//!   of the last kept snapshot and keeps the export when any single tile
//!   has at least `threshold` of its pixels changed.
//!
//! Both fail open: when the verdict cannot be computed the export counts as
//! changed, so data is re-exported rather than silently dropped.

mod hash;
mod threshold;

pub use hash::HashCache;
pub use threshold::{changed_fraction, ThresholdDetector, DEFAULT_CHANGE_THRESHOLD};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::export::ExportConfig;
use crate::snapshot::Snapshot;

/// Decides whether an export changed enough since the last kept snapshot.
pub trait ChangeDetector: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Verdict available before downloading, if the strategy has one.
    ///
    /// `Some(false)` skips the download entirely.
    fn precheck(&self, _config: &ExportConfig) -> Option<bool> {
        None
    }

    /// Verdict for a downloaded snapshot against the last kept one.
    fn is_changed(
        &self,
        config: &ExportConfig,
        baseline: Option<DateTime<Utc>>,
        snapshot: &Snapshot,
    ) -> bool;
}

/// Configured change-detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeStrategy {
    /// Compare server-side tile-group hashes.
    Hash,
    /// Compare pixels against the last kept snapshot.
    #[default]
    Threshold,
}

impl ChangeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStrategy::Hash => "hash",
            ChangeStrategy::Threshold => "threshold",
        }
    }
}

impl fmt::Display for ChangeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hash" => Ok(ChangeStrategy::Hash),
            "threshold" | "pixel" => Ok(ChangeStrategy::Threshold),
            other => Err(format!("unknown change strategy '{}'", other)),
        }
    }
}
