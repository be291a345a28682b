//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;

use ini::{Ini, Properties};

use super::defaults::clamp_concurrency;
use super::duration::parse_duration;
use super::file::ConfigFileError;
use super::settings::{ConfigFile, ExportEntry, ExportRange};
use crate::coord::{TileCoords, WorldCoords, MAX_ZOOM};

/// Prefix of per-export section names.
const EXPORT_SECTION_PREFIX: &str = "export.";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("url") {
            let v = v.trim();
            if !v.is_empty() {
                config.server.url = v.trim_end_matches('/').to_string();
            }
        }
        if let Some(v) = section.get("timeout") {
            config.server.timeout = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "server".to_string(),
                key: "timeout".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer (seconds)".to_string(),
            })?;
        }
        if let Some(v) = section.get("concurrency") {
            let parsed: usize = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "server".to_string(),
                key: "concurrency".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
            config.server.concurrency = clamp_concurrency(parsed);
        }
    }

    // [export] section
    if let Some(section) = ini.section(Some("export")) {
        if let Some(v) = section.get("data_dir") {
            let v = v.trim();
            if !v.is_empty() {
                config.export.data_dir = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("schedule") {
            let v = v.trim();
            config.export.schedule = if v.is_empty() || v.eq_ignore_ascii_case("off") {
                None
            } else {
                Some(parse_duration(v).map_err(|e| ConfigFileError::InvalidValue {
                    section: "export".to_string(),
                    key: "schedule".to_string(),
                    value: v.to_string(),
                    reason: e.to_string(),
                })?)
            };
        }
        if let Some(v) = section.get("strategy") {
            config.export.strategy = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "export".to_string(),
                key: "strategy".to_string(),
                value: v.to_string(),
                reason: "must be 'hash' or 'threshold'".to_string(),
            })?;
        }
        if let Some(v) = section.get("change_threshold") {
            let threshold: f64 = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "export".to_string(),
                key: "change_threshold".to_string(),
                value: v.to_string(),
                reason: "must be a number between 0.0 and 1.0".to_string(),
            })?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigFileError::InvalidValue {
                    section: "export".to_string(),
                    key: "change_threshold".to_string(),
                    value: v.to_string(),
                    reason: "must be a number between 0.0 and 1.0".to_string(),
                });
            }
            config.export.change_threshold = threshold;
        }
        if let Some(v) = section.get("auto_combine") {
            config.export.auto_combine = parse_bool(v);
        }
        if let Some(v) = section.get("retain") {
            config.export.retain = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "export".to_string(),
                key: "retain".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (0 keeps everything)".to_string(),
            })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    // [export.<name>] sections
    for (name, section) in ini.iter() {
        let Some(export_name) = name.and_then(|n| n.strip_prefix(EXPORT_SECTION_PREFIX)) else {
            continue;
        };
        let section_name = format!("{}{}", EXPORT_SECTION_PREFIX, export_name);
        config
            .exports
            .push(parse_export(&section_name, export_name, section)?);
    }

    Ok(config)
}

fn parse_export(
    section_name: &str,
    name: &str,
    section: &Properties,
) -> Result<ExportEntry, ConfigFileError> {
    let required = |key: &str| {
        section
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigFileError::MissingValue {
                section: section_name.to_string(),
                key: key.to_string(),
            })
    };
    let invalid = |key: &str, value: &str, reason: &str| ConfigFileError::InvalidValue {
        section: section_name.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let zoom = match section.get("zoom") {
        None => 0,
        Some(v) => v
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|z| *z <= MAX_ZOOM)
            .ok_or_else(|| {
                invalid("zoom", v, &format!("must be an integer between 0 and {}", MAX_ZOOM))
            })?,
    };

    let range = if section.contains_key("from_world") || section.contains_key("to_world") {
        let from = required("from_world")?;
        let to = required("to_world")?;
        ExportRange::World {
            from: parse_world(from).ok_or_else(|| invalid("from_world", from, "expected 'x,y,z'"))?,
            to: parse_world(to).ok_or_else(|| invalid("to_world", to, "expected 'x,y,z'"))?,
        }
    } else {
        let from = required("from")?;
        let to = required("to")?;
        ExportRange::Tiles {
            from: parse_tile(from).ok_or_else(|| invalid("from", from, "expected 'x,y'"))?,
            to: parse_tile(to).ok_or_else(|| invalid("to", to, "expected 'x,y'"))?,
        }
    };

    Ok(ExportEntry {
        name: name.to_string(),
        world: required("world")?.to_string(),
        map: required("map")?.to_string(),
        zoom,
        range,
    })
}

fn parse_ints<const N: usize>(value: &str) -> Option<[i32; N]> {
    let parts: Vec<i32> = value
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    parts.try_into().ok()
}

/// Parse tile coordinates written as `x,y`.
pub(super) fn parse_tile(value: &str) -> Option<TileCoords> {
    parse_ints::<2>(value).map(|[x, y]| TileCoords::new(x, y))
}

/// Parse world coordinates written as `x,y,z`.
pub(super) fn parse_world(value: &str) -> Option<WorldCoords> {
    parse_ints::<3>(value).map(|[x, y, z]| WorldCoords::new(x, y, z))
}

/// Parse a boolean value from a config string.
///
/// Accepts true/yes/1/on (case-insensitive); anything else is false.
pub(super) fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
