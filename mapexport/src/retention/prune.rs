//! Pruning of superseded kept snapshots.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::addressing::format_instant;
use crate::error::ExportError;
use crate::export::ExportConfig;
use crate::snapshot::{kept_instants, remove_snapshot};

/// Delete the oldest kept snapshots of the export's map beyond `retain`.
///
/// `current` always survives and counts towards `retain`. A `retain` of 0
/// keeps everything. Returns the removed instants, oldest first.
pub fn prune(
    data_root: &Path,
    config: &ExportConfig,
    retain: usize,
    current: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, ExportError> {
    if retain == 0 {
        return Ok(Vec::new());
    }

    let older: Vec<_> = kept_instants(data_root, config)
        .into_iter()
        .filter(|instant| *instant != current)
        .collect();
    let excess = (older.len() + 1).saturating_sub(retain);

    let doomed = &older[..excess.min(older.len())];
    for instant in doomed {
        remove_snapshot(data_root, config, *instant)?;
        info!(
            export = %config.name,
            instant = %format_instant(*instant),
            "Pruned old snapshot"
        );
    }

    Ok(doomed.to_vec())
}
