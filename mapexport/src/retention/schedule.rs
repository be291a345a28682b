//! Persisted record of the last finished scheduled cycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::ExportError;

/// File name of the record under the data directory.
pub const LAST_EXPORT_FILE: &str = "last-export.txt";

/// The instant of the last scheduled cycle, stored as RFC 3339 text.
#[derive(Debug, Clone)]
pub struct LastExportRecord {
    path: PathBuf,
}

impl LastExportRecord {
    pub fn new(data_root: &Path) -> Self {
        Self {
            path: data_root.join(LAST_EXPORT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last recorded instant; the Unix epoch when absent or unreadable.
    pub fn load(&self) -> DateTime<Utc> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return DateTime::UNIX_EPOCH,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read last export time");
                return DateTime::UNIX_EPOCH;
            }
        };

        match DateTime::parse_from_rfc3339(text.trim()) {
            Ok(instant) => instant.with_timezone(&Utc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Malformed last export time");
                DateTime::UNIX_EPOCH
            }
        }
    }

    pub fn save(&self, instant: DateTime<Utc>) -> Result<(), ExportError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExportError::storage(parent, e))?;
        }
        fs::write(&self.path, instant.to_rfc3339()).map_err(|e| ExportError::storage(&self.path, e))
    }
}

/// When the next scheduled cycle fires.
///
/// One interval after the last cycle, or immediately if that moment has
/// already passed.
pub fn next_fire(last: DateTime<Utc>, interval: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    let due = chrono::Duration::from_std(interval)
        .ok()
        .and_then(|step| last.checked_add_signed(step))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    due.max(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_missing_record_is_epoch() {
        let temp = tempfile::TempDir::new().unwrap();
        let record = LastExportRecord::new(temp.path());
        assert_eq!(record.load(), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let record = LastExportRecord::new(&temp.path().join("nested"));
        record.save(at(10, 30)).unwrap();

        assert_eq!(record.load(), at(10, 30));
    }

    #[test]
    fn test_malformed_record_is_epoch() {
        let temp = tempfile::TempDir::new().unwrap();
        let record = LastExportRecord::new(temp.path());
        fs::write(record.path(), "yesterday").unwrap();

        assert_eq!(record.load(), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_next_fire_in_future() {
        let next = next_fire(at(10, 0), Duration::from_secs(3600), at(10, 20));
        assert_eq!(next, at(11, 0));
    }

    #[test]
    fn test_next_fire_clamped_to_now() {
        let next = next_fire(at(6, 0), Duration::from_secs(3600), at(10, 20));
        assert_eq!(next, at(10, 20));

        let never_ran = next_fire(DateTime::UNIX_EPOCH, Duration::from_secs(3600), at(10, 20));
        assert_eq!(never_ran, at(10, 20));
    }
}
