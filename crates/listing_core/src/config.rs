//! UI state remembered between sessions, stored as a small JSON file.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 800;
pub const DEFAULT_START_ROW: u32 = 1;

/// Window size persisted as `"<width>x<height>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
        }
    }
}

impl fmt::Display for WindowGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for WindowGeometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("geometry '{s}' is not <width>x<height>"))?;
        let width = width
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid width in '{s}': {err}"))?;
        let height = height
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid height in '{s}': {err}"))?;
        if width == 0 || height == 0 {
            return Err(format!("geometry '{s}' has a zero dimension"));
        }
        Ok(Self { width, height })
    }
}

impl Serialize for WindowGeometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WindowGeometry {
    /// Unparseable geometry falls back to the default size.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|err| {
            warn!("config: {err}; using default window geometry");
            Self::default()
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedConfig {
    pub last_directory: Option<PathBuf>,
    pub window_geometry: WindowGeometry,
    pub default_start_row: u32,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        Self {
            last_directory: None,
            window_geometry: WindowGeometry::default(),
            default_start_row: DEFAULT_START_ROW,
        }
    }
}

impl PersistedConfig {
    /// Never fails: a missing or unreadable file yields the defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), "config: using defaults: {err}");
                return Self::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %path.display(), "config: ignoring corrupt file: {err}");
            Self::default()
        })
    }

    /// Best effort; failures are logged and otherwise ignored.
    pub fn save(&self, path: &Path) {
        if let Err(err) = self.try_save(path) {
            warn!(path = %path.display(), "config: failed to save: {err}");
        }
    }

    fn try_save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
