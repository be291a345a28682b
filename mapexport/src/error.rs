//! Error types for export operations.
//!
//! Configuration problems ([`ConfigError`]) are never retried: they are
//! reported to the caller and the affected export is skipped. Network and
//! storage failures ([`FetchError`], [`ExportError::Storage`]) are scoped to
//! a single tile or cycle and may be retried on the next scheduled run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Invalid input: unknown names, malformed ranges, bad settings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The map server has no world with this name.
    #[error("no world with name {0}")]
    UnknownWorld(String),

    /// The world exists but has no map with this name.
    #[error("world {world} has no map with name {map}")]
    UnknownMap { world: String, map: String },

    /// The map does not publish a world-to-map matrix.
    #[error("map {map} of world {world} has no worldtomap projection")]
    MissingProjection { world: String, map: String },

    /// A coordinate range could not be parsed or is unusable.
    #[error("invalid range for export {export}: {reason}")]
    InvalidRange { export: String, reason: String },

    /// Zoom level outside the supported range.
    #[error("invalid zoom level {0} (must be between 0 and {max})", max = crate::coord::MAX_ZOOM)]
    InvalidZoom(u32),

    /// A schedule duration such as `1h30m` could not be parsed.
    #[error("invalid duration '{0}' - expected format like '1h', '30m' or '1h30m'")]
    InvalidDuration(String),
}

/// Failure to fetch a single remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be built or parsed. Never retried.
    #[error("malformed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection or protocol failure.
    #[error("request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The request exceeded the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server returned an empty body.
    #[error("{url} returned 0 bytes")]
    Empty { url: String },

    /// The destination directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// Writing the response body to disk failed.
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl FetchError {
    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::InvalidUrl { .. })
    }
}

/// Failure while stitching or saving a mosaic.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// A tile of the snapshot could not be read or decoded.
    #[error("cannot read tile image {}: {source}", path.display())]
    Tile {
        path: PathBuf,
        source: image::ImageError,
    },

    /// A tile image does not have the expected dimensions.
    #[error("tile {} is {width}x{height}, expected {expected}x{expected}", path.display())]
    TileSize {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },

    /// The canvas would not fit in memory addressing.
    #[error("mosaic of {columns}x{rows} tiles is too large")]
    TooLarge { columns: i64, rows: i64 },

    /// Encoding or writing the combined image failed.
    #[error("cannot save combined image to {}: {source}", path.display())]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },

    /// Moving the finished mosaic into place failed.
    #[error("cannot move combined image to {}: {source}", path.display())]
    Rename { path: PathBuf, source: io::Error },
}

/// Top-level error for export cycles and service operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Invalid input, not retryable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Mosaic could not be built.
    #[error(transparent)]
    Mosaic(#[from] MosaicError),

    /// Local filesystem failure.
    #[error("storage error at {}: {source}", path.display())]
    Storage { path: PathBuf, source: io::Error },

    /// The map server configuration has not been loaded.
    #[error("map server configuration is unavailable: {0}")]
    ServerConfigUnavailable(String),

    /// A manual trigger arrived while a cycle was already running.
    #[error("an export cycle is already in progress")]
    CycleInProgress,

    /// The cycle was cancelled by shutdown.
    #[error("export cycle cancelled")]
    Cancelled,
}

impl ExportError {
    /// Create a storage error for the given path.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExportError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Whether the scheduler may retry the failed operation later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Config(_) => false,
            ExportError::Fetch(e) => e.is_retryable(),
            ExportError::Mosaic(_) => true,
            ExportError::Storage { .. } => true,
            ExportError::ServerConfigUnavailable(_) => true,
            ExportError::CycleInProgress => true,
            ExportError::Cancelled => false,
        }
    }
}
