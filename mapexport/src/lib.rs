//! MapExport - Periodic tile snapshots of a live Minecraft web map
//!
//! This library downloads rectangular regions of a Dynmap-style tile server
//! into timestamped snapshot directories, keeps only snapshots that differ
//! enough from the previous one, and stitches kept snapshots into a single
//! mosaic image.
//!
//! The entry point for hosts is [`service::ExportService`].

pub mod addressing;
pub mod change;
pub mod config;
pub mod coord;
pub mod error;
pub mod export;
pub mod fetch;
pub mod http;
pub mod logging;
pub mod mosaic;
pub mod retention;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod snapshot;

pub use error::{ExportError, ExportResult};
pub use export::{ExportConfig, MapId};
pub use service::{ExportService, ExportSummary};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
