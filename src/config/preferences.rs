use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::active_pad::SelectedPad;
use crate::thresholds::{CustomSensorList, SensorOwnership};

/// Persisted UI preferences. Every field falls back to its default when
/// missing from the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_advanced_mode")]
    pub advanced_mode: bool,
    #[serde(default)]
    pub use_inner_sensor_thresholds: bool,
    #[serde(default)]
    pub use_outer_sensor_thresholds: bool,
    /// Custom sensor list as `[[panel, sensor], ...]` JSON text
    #[serde(default)]
    pub custom_sensors: String,
    #[serde(default)]
    pub selected_pad: SelectedPad,
}

fn default_advanced_mode() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            advanced_mode: default_advanced_mode(),
            use_inner_sensor_thresholds: false,
            use_outer_sensor_thresholds: false,
            custom_sensors: String::new(),
            selected_pad: SelectedPad::default(),
        }
    }
}

impl Preferences {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    /// Load from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Never fails: a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No preferences file, using defaults");
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences from {:?}", path))
            .and_then(|contents| {
                serde_json::from_str::<Preferences>(&contents)
                    .with_context(|| format!("Failed to parse preferences from {:?}", path))
            });

        match parsed {
            Ok(prefs) => {
                info!(path = %path.display(), "Loaded preferences");
                prefs
            }
            Err(e) => {
                error!(error = ?e, "Preferences unusable, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create preferences directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize preferences")?;

        fs::write(path, json).with_context(|| format!("Failed to write preferences to {:?}", path))?;

        info!(path = %path.display(), "Saved preferences");
        Ok(())
    }

    pub fn custom_sensor_list(&self) -> CustomSensorList {
        CustomSensorList::decode(&self.custom_sensors)
    }

    pub fn ownership(&self) -> SensorOwnership {
        SensorOwnership {
            use_inner_sensor_thresholds: self.use_inner_sensor_thresholds,
            use_outer_sensor_thresholds: self.use_outer_sensor_thresholds,
            custom_sensors: self.custom_sensor_list(),
        }
    }

    pub fn set_ownership(&mut self, ownership: &SensorOwnership) {
        self.use_inner_sensor_thresholds = ownership.use_inner_sensor_thresholds;
        self.use_outer_sensor_thresholds = ownership.use_outer_sensor_thresholds;
        self.custom_sensors = if ownership.custom_sensors.is_empty() {
            String::new()
        } else {
            ownership.custom_sensors.encode()
        };
    }
}
