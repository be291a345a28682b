//! Timer that runs every export on a fixed interval.
//!
//! The next fire is one interval after the last finished scheduled cycle,
//! read from [`LastExportRecord`], so restarts do not reset the clock. A
//! cycle that is overdue runs immediately.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = ExportScheduler::new(service, interval, record);
//! tokio::spawn(scheduler.run(shutdown_token));
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::format_duration;
use crate::error::ExportError;
use crate::retention::{next_fire, LastExportRecord};
use crate::service::ExportService;

/// Background task driving scheduled export cycles.
pub struct ExportScheduler {
    service: Arc<ExportService>,
    interval: Duration,
    record: LastExportRecord,
}

impl ExportScheduler {
    pub fn new(service: Arc<ExportService>, interval: Duration, record: LastExportRecord) -> Self {
        Self {
            service,
            interval,
            record,
        }
    }

    /// How long to wait before the next cycle.
    pub fn delay_until_next(&self) -> Duration {
        let now = Utc::now();
        let due = next_fire(self.record.load(), self.interval, now);
        (due - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Runs the scheduler until shutdown is signalled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval = %format_duration(self.interval),
            record = %self.record.path().display(),
            "Export scheduler starting"
        );

        loop {
            let delay = self.delay_until_next();
            debug!(delay_secs = delay.as_secs(), "Next scheduled export");

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Export scheduler shutting down");
                    break;
                }

                _ = tokio::time::sleep(delay) => {
                    self.fire().await;
                }
            }
        }
    }

    async fn fire(&self) {
        let service = Arc::clone(&self.service);
        let result = tokio::task::spawn_blocking(move || service.run_scheduled()).await;

        match result {
            Ok(Ok(summary)) => {
                info!(%summary, "Scheduled export finished");
                self.record_finish();
            }
            Ok(Err(ExportError::Cancelled)) => {
                info!("Scheduled export cancelled");
            }
            Ok(Err(e)) => {
                error!(error = %e, "Scheduled export failed");
                // Still advance the clock so a broken server is not hammered
                self.record_finish();
            }
            Err(e) => {
                error!(error = %e, "Scheduled export task panicked");
                self.record_finish();
            }
        }
    }

    fn record_finish(&self) {
        if let Err(e) = self.record.save(Utc::now().trunc_subsecs(0)) {
            warn!(error = %e, "Could not record last export time");
        }
    }
}
