//! The export service: everything a host needs to run exports.
//!
//! [`ExportService`] owns its configuration, HTTP client and cache state.
//! Hosts (the CLI, a daemon, tests) call into it; it never reaches back.
//!
//! Cycles are single-flight. Manual triggers are rejected with
//! [`ExportError::CycleInProgress`] while another cycle runs, scheduled
//! triggers wait their turn.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::addressing::{local_tile_file, remote_tile_path};
use crate::change::{ChangeDetector, ChangeStrategy, HashCache, ThresholdDetector};
use crate::config::{format_duration, ConfigFile};
use crate::coord::{project_world_to_tile, TileCoords, WorldCoords, MAX_ZOOM};
use crate::error::{ConfigError, ExportError, ExportResult};
use crate::export::ExportConfig;
use crate::fetch::FetchOrchestrator;
use crate::http::{HttpClient, ReqwestClient};
use crate::retention::{CycleOutcome, CycleRunner, LastExportRecord};
use crate::scheduler::ExportScheduler;
use crate::server::{join_url, validate_base_url, ServerConfiguration};
use crate::snapshot::{remove_snapshot, unused_instant};

/// Counts of one pass over every configured export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Snapshots kept.
    pub exported: usize,
    /// Exports without enough change, or without any fetched tile.
    pub skipped: usize,
    /// Exports that failed, including ones with invalid configuration.
    pub failed: usize,
}

impl std::fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Exported {} configs, skipped {}, failed {}",
            self.exported, self.skipped, self.failed
        )
    }
}

/// State rebuilt on every (re)load.
struct Loaded {
    settings: ConfigFile,
    server: ServerConfiguration,
    exports: Vec<ExportConfig>,
    invalid: Vec<(String, ConfigError)>,
    runner: CycleRunner,
}

impl Loaded {
    fn load(settings: ConfigFile, client: Arc<dyn HttpClient>) -> ExportResult<Self> {
        validate_base_url(&settings.server.url)?;
        let server = ServerConfiguration::fetch(client.as_ref(), &settings.server.url)?;

        let mut exports = Vec::new();
        let mut invalid = Vec::new();
        for entry in &settings.exports {
            match entry.build(&server) {
                Ok(config) => exports.push(config),
                Err(e) => {
                    error!(export = %entry.name, error = %e, "Skipping export configuration");
                    invalid.push((entry.name.clone(), e));
                }
            }
        }

        let data_root = settings.export.data_dir.clone();
        let url = settings.server.url.clone();
        let fetcher = FetchOrchestrator::new(
            Arc::clone(&client),
            url.clone(),
            data_root.clone(),
            settings.server.concurrency,
        );
        let detector: Box<dyn ChangeDetector> = match settings.export.strategy {
            ChangeStrategy::Hash => Box::new(HashCache::new(client, url, data_root.clone())),
            ChangeStrategy::Threshold => Box::new(ThresholdDetector::new(
                data_root.clone(),
                settings.export.change_threshold,
            )),
        };
        let runner = CycleRunner::new(
            data_root,
            fetcher,
            detector,
            settings.export.auto_combine,
            settings.export.retain,
        );

        info!(
            worlds = server.worlds.len(),
            exports = exports.len(),
            invalid = invalid.len(),
            strategy = %settings.export.strategy,
            "Loaded configuration"
        );

        Ok(Self {
            settings,
            server,
            exports,
            invalid,
            runner,
        })
    }
}

/// Runs exports on demand or on a timer.
pub struct ExportService {
    client: Arc<dyn HttpClient>,
    loaded: RwLock<Arc<Loaded>>,
    cycle: Mutex<()>,
    shutdown: CancellationToken,
}

impl ExportService {
    /// Create a service using `client` for every request.
    ///
    /// Fetches the map server configuration; exports that do not resolve
    /// against it are logged and skipped.
    pub fn new(settings: ConfigFile, client: Arc<dyn HttpClient>) -> ExportResult<Self> {
        let loaded = Loaded::load(settings, Arc::clone(&client))?;
        Ok(Self {
            client,
            loaded: RwLock::new(Arc::new(loaded)),
            cycle: Mutex::new(()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Create a service with a blocking reqwest client.
    ///
    /// Must not be called from within an async context.
    pub fn with_reqwest(settings: ConfigFile) -> ExportResult<Self> {
        let client = ReqwestClient::with_timeout(settings.server.timeout)?;
        Self::new(settings, Arc::new(client))
    }

    fn snapshot(&self) -> Arc<Loaded> {
        Arc::clone(&self.loaded.read())
    }

    /// Currently loaded settings.
    pub fn settings(&self) -> ConfigFile {
        self.snapshot().settings.clone()
    }

    /// Token cancelled by [`stop`](Self::stop).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start the timer, if a schedule is configured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let loaded = self.snapshot();
        let Some(interval) = loaded.settings.export.schedule else {
            info!("No schedule configured, exports run on demand only");
            return None;
        };

        let record = LastExportRecord::new(&loaded.settings.export.data_dir);
        let scheduler = ExportScheduler::new(Arc::clone(self), interval, record);
        Some(tokio::spawn(scheduler.run(self.shutdown.child_token())))
    }

    /// Stop the timer and abort any cycle in flight.
    pub fn stop(&self) {
        info!("Stopping export service");
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run every export once, now.
    ///
    /// Rejected with [`ExportError::CycleInProgress`] while another cycle runs.
    pub fn run_once(&self) -> ExportResult<ExportSummary> {
        let guard = self.cycle.try_lock().ok_or(ExportError::CycleInProgress)?;
        self.run_all(guard)
    }

    /// Run every export once, waiting for any cycle in flight to finish.
    pub fn run_scheduled(&self) -> ExportResult<ExportSummary> {
        let guard = self.cycle.lock();
        self.run_all(guard)
    }

    fn run_all(&self, _guard: MutexGuard<'_, ()>) -> ExportResult<ExportSummary> {
        let loaded = self.snapshot();
        let mut summary = ExportSummary {
            failed: loaded.invalid.len(),
            ..Default::default()
        };

        for config in &loaded.exports {
            if self.shutdown.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            let instant = Utc::now().trunc_subsecs(0);
            match loaded.runner.run(config, instant, &self.shutdown) {
                Ok(CycleOutcome::Kept { .. }) => summary.exported += 1,
                Ok(CycleOutcome::Unchanged | CycleOutcome::Empty) => summary.skipped += 1,
                Err(ExportError::Cancelled) => return Err(ExportError::Cancelled),
                Err(e) => {
                    error!(export = %config.name, error = %e, "Export failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            exported = summary.exported,
            skipped = summary.skipped,
            failed = summary.failed,
            "Export cycle finished"
        );
        Ok(summary)
    }

    /// Re-read settings and the map server configuration.
    ///
    /// Waits for any cycle in flight. On failure the previous state stays.
    pub fn reload(&self, settings: ConfigFile) -> ExportResult<()> {
        let _guard = self.cycle.lock();
        let loaded = Loaded::load(settings, Arc::clone(&self.client))?;
        *self.loaded.write() = Arc::new(loaded);
        info!("Reloaded configuration");
        Ok(())
    }

    /// Tile containing a world position on the given map.
    pub fn compute_tile(
        &self,
        world: &str,
        map: &str,
        position: WorldCoords,
        zoom: u8,
    ) -> ExportResult<TileCoords> {
        let loaded = self.snapshot();
        let (_, projection) = loaded.server.resolve(world, map)?;
        check_zoom(zoom)?;
        Ok(project_world_to_tile(position, &projection, zoom))
    }

    /// Successfully resolved export configurations.
    pub fn list_configs(&self) -> Vec<ExportConfig> {
        self.snapshot().exports.clone()
    }

    /// Download the single tile containing a world position.
    ///
    /// The tile lands in a fresh snapshot directory of its map; no change
    /// detection or retention applies. Returns the written file.
    pub fn export_tile(
        &self,
        world: &str,
        map: &str,
        position: WorldCoords,
        zoom: u8,
    ) -> ExportResult<PathBuf> {
        let _guard = self.cycle.try_lock().ok_or(ExportError::CycleInProgress)?;
        let loaded = self.snapshot();

        let (id, projection) = loaded.server.resolve(world, map)?;
        check_zoom(zoom)?;
        let tile = project_world_to_tile(position, &projection, zoom);
        let config = ExportConfig::from_tiles(format!("tile {}", tile), id, zoom, tile, tile)?;

        let data_root = &loaded.settings.export.data_dir;
        let instant = unused_instant(data_root, &config, Utc::now().trunc_subsecs(0));
        let url = join_url(&loaded.settings.server.url, &remote_tile_path(&config, tile));
        let dest = local_tile_file(data_root, &config, instant, tile);

        let bytes = self.client.download(&url, &dest).inspect_err(|e| {
            warn!(url = %url, error = %e, "Tile export failed");
            if let Err(e) = remove_snapshot(data_root, &config, instant) {
                warn!(error = %e, "Could not clean up failed tile export");
            }
        })?;
        info!(tile = %tile, path = %dest.display(), bytes, "Exported tile");
        Ok(dest)
    }

    /// Human-readable dump of worlds, maps and exports.
    pub fn debug_info(&self) -> String {
        let loaded = self.snapshot();
        let settings = &loaded.settings;
        let mut out = String::new();

        let _ = writeln!(out, "Server: {}", settings.server.url);
        let _ = writeln!(out, "Data directory: {}", settings.export.data_dir.display());
        let _ = writeln!(
            out,
            "Schedule: {}",
            settings
                .export
                .schedule
                .map(format_duration)
                .unwrap_or_else(|| "off".to_string())
        );
        let _ = writeln!(
            out,
            "Change detection: {} (threshold {})",
            loaded.runner.detector_name(),
            settings.export.change_threshold
        );

        let _ = writeln!(out, "Worlds:");
        for world in &loaded.server.worlds {
            let _ = writeln!(out, "  {}", world.name);
            for map in &world.maps {
                let _ = writeln!(out, "    {} (prefix {})", map.name, map.prefix);
            }
        }

        let _ = writeln!(out, "Exports:");
        for config in &loaded.exports {
            let _ = writeln!(
                out,
                "  {} [{} tiles, {}]",
                config,
                config.tile_count(),
                loaded.runner.state(&config.name)
            );
        }
        for (name, e) in &loaded.invalid {
            let _ = writeln!(out, "  {} [invalid: {}]", name, e);
        }

        out
    }

    /// When the last scheduled cycle finished.
    pub fn last_export(&self) -> DateTime<Utc> {
        LastExportRecord::new(&self.snapshot().settings.export.data_dir).load()
    }
}

fn check_zoom(zoom: u8) -> Result<(), ConfigError> {
    if zoom > MAX_ZOOM {
        return Err(ConfigError::InvalidZoom(zoom as u32));
    }
    Ok(())
}
