//! Map server configuration endpoint.
//!
//! `GET {url}/up/configuration` lists the server's worlds and maps along
//! with each map's world-to-map projection. Only the fields needed for
//! tile addressing are decoded; everything else is ignored.

use serde::Deserialize;
use tracing::{debug, error};

use crate::coord::MapProjection;
use crate::error::{ConfigError, ExportError, FetchError};
use crate::export::MapId;
use crate::http::HttpClient;

/// Path of the configuration endpoint.
pub const CONFIGURATION_PATH: &str = "up/configuration";

/// Worlds and maps published by the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfiguration {
    #[serde(default)]
    pub worlds: Vec<ServerWorld>,
}

/// One world and its map layers.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerWorld {
    pub name: String,
    #[serde(default)]
    pub maps: Vec<ServerMap>,
}

/// One map layer of a world.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMap {
    pub name: String,
    pub prefix: String,
    /// Absent for maps that cannot be addressed by world position.
    #[serde(default)]
    pub worldtomap: Option<[f64; 9]>,
}

impl ServerConfiguration {
    /// Download and decode the configuration from `base_url`.
    pub fn fetch(client: &dyn HttpClient, base_url: &str) -> Result<Self, ExportError> {
        let url = join_url(base_url, CONFIGURATION_PATH);
        let body = client.get(&url).map_err(|e| {
            error!(url = %url, error = %e, "Could not download map server configuration");
            ExportError::from(e)
        })?;

        let config = Self::from_json(&body).map_err(|e| {
            error!(url = %url, error = %e, "Could not parse map server configuration");
            ExportError::ServerConfigUnavailable(e.to_string())
        })?;

        debug!(
            url = %url,
            worlds = config.worlds.len(),
            "Loaded map server configuration"
        );
        Ok(config)
    }

    /// Decode the configuration JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Case-insensitive world lookup.
    pub fn world(&self, name: &str) -> Result<&ServerWorld, ConfigError> {
        self.worlds
            .iter()
            .find(|w| w.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownWorld(name.to_string()))
    }

    /// Case-insensitive map lookup within a world.
    pub fn map(&self, world: &str, map: &str) -> Result<(&ServerWorld, &ServerMap), ConfigError> {
        let w = self.world(world)?;
        let m = w
            .maps
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(map))
            .ok_or_else(|| ConfigError::UnknownMap {
                world: w.name.clone(),
                map: map.to_string(),
            })?;
        Ok((w, m))
    }

    /// Resolve a world/map pair to its identity and projection.
    pub fn resolve(&self, world: &str, map: &str) -> Result<(MapId, MapProjection), ConfigError> {
        let (w, m) = self.map(world, map)?;
        let matrix = m.worldtomap.ok_or_else(|| ConfigError::MissingProjection {
            world: w.name.clone(),
            map: m.name.clone(),
        })?;
        Ok((
            MapId::new(&w.name, &m.name, &m.prefix),
            MapProjection::new(matrix),
        ))
    }
}

/// Join a server base URL and a relative path with exactly one slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Validate a base URL before any request is made.
pub fn validate_base_url(base_url: &str) -> Result<(), FetchError> {
    match reqwest::Url::parse(base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(FetchError::InvalidUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => Err(FetchError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        }),
    }
}
