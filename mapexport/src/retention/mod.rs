//! Export retention: what to keep, what to prune, and when to run.
//!
//! Each export moves through `Idle → Fetching → Evaluating → Kept |
//! Discarded → Idle`. Only kept snapshots become the baseline for the next
//! comparison; a discarded snapshot is deleted immediately, while any hash
//! cache it touched stays advanced.

mod cycle;
mod prune;
mod schedule;

pub use cycle::{CycleOutcome, CycleRunner, CycleState};
pub use prune::prune;
pub use schedule::{next_fire, LastExportRecord, LAST_EXPORT_FILE};
