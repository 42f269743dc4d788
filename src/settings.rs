//! Playback settings and preferences
//!
//! Stored as JSON next to the learner's other preferences. The browser host
//! keeps its own copy and passes values in through the engine bindings.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Named positions on the speed slider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpeedPreset {
    Slow,
    #[default]
    Normal,
    Fast,
    Instant,
}

impl SpeedPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedPreset::Slow => "Slow",
            SpeedPreset::Normal => "Normal",
            SpeedPreset::Fast => "Fast",
            SpeedPreset::Instant => "Instant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "slow" => Some(SpeedPreset::Slow),
            "normal" | "default" => Some(SpeedPreset::Normal),
            "fast" => Some(SpeedPreset::Fast),
            "instant" | "max" => Some(SpeedPreset::Instant),
            _ => None,
        }
    }

    /// Slider value (0-100) for this preset
    pub fn speed(&self) -> u8 {
        match self {
            SpeedPreset::Slow => 20,
            SpeedPreset::Normal => 50,
            SpeedPreset::Fast => 80,
            SpeedPreset::Instant => 100,
        }
    }
}

/// Playback preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Speed slider, 0 (slowest) to 100 (fastest)
    pub speed: u8,
    /// Include the reference drawing in the engine view (ghost overlay)
    pub show_reference: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speed: SpeedPreset::Normal.speed(),
            show_reference: true,
        }
    }
}

impl Settings {
    /// Create settings from a speed preset
    pub fn from_preset(preset: SpeedPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    pub fn apply_preset(&mut self, preset: SpeedPreset) {
        self.speed = preset.speed();
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("Using default settings");
                Self::default()
            }
            Err(e) => {
                log::warn!("Could not read settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)?;
        log::info!("Settings saved");
        Ok(())
    }
}
