use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facescan_core::shared::color::Color;
use facescan_core::shared::constants::{
    DEFAULT_MIN_NEIGHBORS, DEFAULT_MIN_SIZE, DEFAULT_SCALE_FACTOR, DEFAULT_THICKNESS,
};

/// Detection and drawing defaults, optionally read from `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub rect_color: Color,
    pub thickness: u32,
    pub min_size: (u32, u32),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            rect_color: Color::default(),
            thickness: DEFAULT_THICKNESS,
            min_size: DEFAULT_MIN_SIZE,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceScan").join("settings.json"))
    }

    /// Reads `explicit` if given, else the per-user settings file.
    ///
    /// An explicit file must exist and parse. The per-user file is optional;
    /// if it is unreadable the defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = explicit {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
            let settings = serde_json::from_str(&json)
                .map_err(|e| format!("Invalid config {}: {e}", path.display()))?;
            return Ok(settings);
        }

        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        let Ok(json) = fs::read_to_string(&path) else {
            return Ok(Self::default());
        };
        match serde_json::from_str(&json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                log::warn!("Ignoring invalid settings at {}: {e}", path.display());
                Ok(Self::default())
            }
        }
    }
}
