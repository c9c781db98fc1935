//! Persistent user preferences: a flat TOML table of string keys and values.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Path of the last file opened.
pub const LAST_OPENED: &str = "last_opened";
/// Label of the last version selected.
pub const LAST_VERSION: &str = "last_version";
/// Main window placement as `x,y,width,height`.
pub const WINDOW_GEOMETRY: &str = "window_geometry";

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("failed to write preferences: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Window placement remembered between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, width, height] = parts.as_slice() else {
            return Err(format!("expected x,y,width,height, got '{s}'"));
        };
        let parse_err = |e: std::num::ParseIntError| format!("invalid geometry '{s}': {e}");
        Ok(Self {
            x: x.parse().map_err(parse_err)?,
            y: y.parse().map_err(parse_err)?,
            width: width.parse().map_err(parse_err)?,
            height: height.parse().map_err(parse_err)?,
        })
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Key-value preference store backed by one TOML file.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Preferences {
    /// Loads preferences from `path`.
    ///
    /// A missing file yields an empty store; an unreadable or malformed one
    /// is logged and also yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed preferences {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read preferences {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Stored window geometry, if present and well-formed.
    pub fn window_geometry(&self) -> Option<Geometry> {
        let raw = self.get(WINDOW_GEOMETRY)?;
        raw.parse()
            .inspect_err(|e| log::warn!("Ignoring stored {WINDOW_GEOMETRY}: {e}"))
            .ok()
    }

    pub fn set_window_geometry(&mut self, geometry: Geometry) {
        self.set(WINDOW_GEOMETRY, geometry.to_string());
    }

    /// Writes the store back to its file, creating parent directories.
    pub fn save(&self) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string(&self.values)?)?;
        log::debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}
