//! `.smxcfg` settings files
//!
//! A pad's thresholds, enabled panels and colours plus the local threshold
//! preferences, as a JSON object. Every key is optional on import; a key
//! that is missing or has the wrong type leaves the current value alone.

use tracing::{debug, warn};

use crate::codec::PackedConfig;
use crate::color::Rgb;
use crate::constants::panels;
use crate::error::ImportError;
use crate::json::{self, JsonObject, JsonValue};
use crate::thresholds::{CustomSensorList, SensorOwnership};

pub const FSR_LOW_THRESHOLDS: &str = "fsrLowThresholds";
pub const FSR_HIGH_THRESHOLDS: &str = "fsrHighThresholds";
pub const PANEL_LOW_THRESHOLDS: &str = "panelLowThresholds";
pub const PANEL_HIGH_THRESHOLDS: &str = "panelHighThresholds";
pub const ENABLED_PANELS: &str = "enabledPanels";
pub const PANEL_COLORS: &str = "panelColors";
pub const ADVANCED_MODE: &str = "advancedMode";
pub const USE_OUTER_SENSOR_THRESHOLDS: &str = "useOuterSensorThresholds";
pub const USE_INNER_SENSOR_THRESHOLDS: &str = "useInnerSensorThresholds";
pub const CUSTOM_SENSORS: &str = "customSensors";

/// Serialize `config` and the local preferences. Pressure-sensor pads export
/// sensor 0 of each panel; the other sensors are assumed to match it.
pub fn export_settings(config: &PackedConfig, advanced_mode: bool, ownership: &SensorOwnership) -> String {
    let mut doc = JsonObject::new();

    if config.fsr() {
        let settings = &config.panel_settings;
        doc.insert(FSR_LOW_THRESHOLDS, settings.iter().map(|p| p.fsr_low[0]).collect::<JsonValue>());
        doc.insert(FSR_HIGH_THRESHOLDS, settings.iter().map(|p| p.fsr_high[0]).collect::<JsonValue>());
    } else {
        let settings = &config.panel_settings;
        doc.insert(PANEL_LOW_THRESHOLDS, settings.iter().map(|p| p.load_cell_low).collect::<JsonValue>());
        doc.insert(PANEL_HIGH_THRESHOLDS, settings.iter().map(|p| p.load_cell_high).collect::<JsonValue>());
    }

    let enabled = config.enabled_panels();
    doc.insert(
        ENABLED_PANELS,
        (0..panels::COUNT).filter(|&p| enabled[p]).collect::<JsonValue>(),
    );

    doc.insert(
        PANEL_COLORS,
        (0..panels::COUNT)
            .map(|p| config.step_color(p).to_string())
            .collect::<JsonValue>(),
    );

    doc.insert(ADVANCED_MODE, advanced_mode);
    doc.insert(USE_OUTER_SENSOR_THRESHOLDS, ownership.use_outer_sensor_thresholds);
    doc.insert(USE_INNER_SENSOR_THRESHOLDS, ownership.use_inner_sensor_thresholds);
    doc.insert(CUSTOM_SENSORS, ownership.custom_sensors.to_json());

    json::serialize(&JsonValue::Object(doc))
}

/// A parsed settings file, ready to apply. Parsing is the only step that can
/// fail, so nothing is touched until the whole document is known good.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    root: JsonObject,
}

impl SettingsDocument {
    pub fn parse(text: &str) -> Result<Self, ImportError> {
        match json::parse(text)? {
            JsonValue::Object(root) => Ok(Self { root }),
            _ => Err(ImportError::NotAnObject),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.iter().map(|(k, _)| k)
    }

    /// Thresholds, enabled panels and colours. Which threshold keys are read
    /// depends on the target pad's hardware, not on what was exported.
    pub fn apply_to_config(&self, config: &mut PackedConfig) {
        if config.fsr() {
            let low = self.root.get_array(FSR_LOW_THRESHOLDS).unwrap_or_default();
            let high = self.root.get_array(FSR_HIGH_THRESHOLDS).unwrap_or_default();
            for (panel, settings) in config.panel_settings.iter_mut().enumerate() {
                if let Some(v) = byte_at(low, panel) {
                    settings.fsr_low = [v; 4];
                }
                if let Some(v) = byte_at(high, panel) {
                    settings.fsr_high = [v; 4];
                }
            }
        } else {
            let low = self.root.get_array(PANEL_LOW_THRESHOLDS).unwrap_or_default();
            let high = self.root.get_array(PANEL_HIGH_THRESHOLDS).unwrap_or_default();
            for (panel, settings) in config.panel_settings.iter_mut().enumerate() {
                if let Some(v) = byte_at(low, panel) {
                    settings.load_cell_low = v;
                }
                if let Some(v) = byte_at(high, panel) {
                    settings.load_cell_high = v;
                }
            }
        }

        if let Some(list) = self.root.get_array(ENABLED_PANELS) {
            let mut enabled = [false; panels::COUNT];
            for entry in list {
                match entry.as_i64().and_then(|p| usize::try_from(p).ok()) {
                    Some(panel) if panel < panels::COUNT => enabled[panel] = true,
                    _ => debug!(?entry, "Skipping invalid enabled panel"),
                }
            }
            config.set_enabled_panels(enabled);
        }

        if let Some(colors) = self.root.get_array(PANEL_COLORS) {
            for (panel, entry) in colors.iter().take(panels::COUNT).enumerate() {
                let color = entry.as_str().map_or(Rgb::WHITE, Rgb::parse_or_white);
                config.set_step_color(panel, color);
            }
        }
    }

    /// View mode and sensor ownership preferences
    pub fn apply_to_local(&self, advanced_mode: &mut bool, ownership: &mut SensorOwnership) {
        *advanced_mode = self.root.bool_or(ADVANCED_MODE, *advanced_mode);
        ownership.use_outer_sensor_thresholds =
            self.root.bool_or(USE_OUTER_SENSOR_THRESHOLDS, ownership.use_outer_sensor_thresholds);
        ownership.use_inner_sensor_thresholds =
            self.root.bool_or(USE_INNER_SENSOR_THRESHOLDS, ownership.use_inner_sensor_thresholds);

        match self.root.get(CUSTOM_SENSORS) {
            Some(value @ JsonValue::Array(_)) => ownership.custom_sensors = CustomSensorList::from_json(value),
            Some(other) => warn!(value = ?other, "Ignoring customSensors that is not a list"),
            None => {}
        }
    }
}

/// Parse `text` and apply it to one config and the local preferences.
/// On a parse error nothing is modified.
pub fn import_settings(
    text: &str,
    config: &mut PackedConfig,
    advanced_mode: &mut bool,
    ownership: &mut SensorOwnership,
) -> Result<(), ImportError> {
    let doc = SettingsDocument::parse(text)?;
    doc.apply_to_config(config);
    doc.apply_to_local(advanced_mode, ownership);
    Ok(())
}

fn byte_at(list: &[JsonValue], index: usize) -> Option<u8> {
    list.get(index).and_then(JsonValue::as_u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::wire::FLAG_FSR;
    use crate::types::{PanelAndSensor, ThresholdPair};

    fn load_cell_config() -> PackedConfig {
        let mut c = PackedConfig::default();
        c.master_version = 3;
        for panel in 0..panels::COUNT {
            c.set_panel_thresholds(panel, ThresholdPair::new(10 + panel as u8, 50 + panel as u8));
            c.set_step_color(panel, Rgb::new(0x1C * panel as u8, 0x10, 0xAA));
        }
        c.set_enabled_panels([false, true, false, true, true, true, false, true, false]);
        c
    }

    fn fsr_config() -> PackedConfig {
        let mut c = load_cell_config();
        c.master_version = 5;
        c.flags = FLAG_FSR;
        c
    }

    #[test]
    fn export_load_cell_keys() {
        let text = export_settings(&load_cell_config(), true, &SensorOwnership::default());
        let doc = SettingsDocument::parse(&text).unwrap();
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(
            keys,
            [
                PANEL_LOW_THRESHOLDS,
                PANEL_HIGH_THRESHOLDS,
                ENABLED_PANELS,
                PANEL_COLORS,
                ADVANCED_MODE,
                USE_OUTER_SENSOR_THRESHOLDS,
                USE_INNER_SENSOR_THRESHOLDS,
                CUSTOM_SENSORS,
            ]
        );
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn export_fsr_uses_sensor_zero() {
        let mut c = fsr_config();
        c.set_sensor_thresholds(PanelAndSensor::new(4, 0), ThresholdPair::new(100, 120));
        c.set_sensor_thresholds(PanelAndSensor::new(4, 1), ThresholdPair::new(1, 2));
        let text = export_settings(&c, false, &SensorOwnership::default());
        let root = json::parse(&text).unwrap();
        let root = root.as_object().unwrap();
        assert!(!root.contains_key(PANEL_LOW_THRESHOLDS));
        assert_eq!(root.get_array(FSR_LOW_THRESHOLDS).unwrap()[4].as_u8(), Some(100));
        assert_eq!(root.get_array(FSR_HIGH_THRESHOLDS).unwrap()[4].as_u8(), Some(120));
        assert_eq!(root.get_bool(ADVANCED_MODE), Some(false));
    }

    #[test]
    fn export_then_import_restores_config() {
        let source = load_cell_config();
        let mut ownership = SensorOwnership::default();
        ownership.use_inner_sensor_thresholds = true;
        ownership.custom_sensors.add(PanelAndSensor::new(1, 2));
        let text = export_settings(&source, false, &ownership);

        let mut target = PackedConfig { master_version: 3, ..Default::default() };
        let mut advanced = true;
        let mut imported = SensorOwnership::default();
        import_settings(&text, &mut target, &mut advanced, &mut imported).unwrap();

        assert!(target.thresholds_equal(&source));
        assert_eq!(target.enabled_sensors, source.enabled_sensors);
        assert_eq!(target.step_color, source.step_color);
        assert!(!advanced);
        assert_eq!(imported, ownership);
    }

    #[test]
    fn fsr_import_sets_all_four_sensors() {
        let mut c = fsr_config();
        let text = r#"{"fsrLowThresholds": [1, 2, 3, 4, 5, 6, 7, 8, 9], "fsrHighThresholds": [9]}"#;
        let mut advanced = true;
        let mut ownership = SensorOwnership::default();
        import_settings(text, &mut c, &mut advanced, &mut ownership).unwrap();
        assert_eq!(c.panel_settings[6].fsr_low, [7; 4]);
        assert_eq!(c.panel_settings[0].fsr_high, [9; 4]);
        // short list: remaining panels keep their values
        assert_eq!(c.panel_settings[1].fsr_high, [0; 4]);
    }

    #[test]
    fn missing_panel_colors_keeps_colors() {
        let mut c = load_cell_config();
        let before = c.step_color;
        let mut advanced = true;
        let mut ownership = SensorOwnership::default();
        import_settings(r#"{"panelLowThresholds": [1]}"#, &mut c, &mut advanced, &mut ownership).unwrap();
        assert_eq!(c.step_color, before);
        assert_eq!(c.panel_settings[0].load_cell_low, 1);
    }

    #[test]
    fn short_and_invalid_colors() {
        let mut c = load_cell_config();
        let before = c.step_color;
        let mut advanced = true;
        let mut ownership = SensorOwnership::default();
        import_settings(r##"{"panelColors": ["#000000", "bogus"]}"##, &mut c, &mut advanced, &mut ownership)
            .unwrap();
        assert_eq!(c.step_color(0), Rgb::new(0, 0, 0));
        assert_eq!(c.step_color(1), Rgb::WHITE);
        assert_eq!(c.step_color[6..], before[6..]);
    }

    #[test]
    fn enabled_panels_skips_out_of_range() {
        let mut c = load_cell_config();
        let mut advanced = true;
        let mut ownership = SensorOwnership::default();
        import_settings(r#"{"enabledPanels": [0, 8, 9, -1, "x"]}"#, &mut c, &mut advanced, &mut ownership).unwrap();
        let mut expected = [false; panels::COUNT];
        expected[0] = true;
        expected[8] = true;
        assert_eq!(c.enabled_panels(), expected);
    }

    #[test]
    fn mistyped_keys_keep_prior_values() {
        let mut c = load_cell_config();
        let before = c;
        let mut advanced = false;
        let mut ownership = SensorOwnership::default();
        ownership.custom_sensors.add(PanelAndSensor::new(0, 0));
        let keep = ownership.clone();
        let text = r#"{"panelLowThresholds": "nope", "enabledPanels": 3, "advancedMode": 1, "customSensors": {}}"#;
        import_settings(text, &mut c, &mut advanced, &mut ownership).unwrap();
        assert_eq!(c, before);
        assert!(!advanced);
        assert_eq!(ownership, keep);
    }

    #[test]
    fn parse_error_leaves_everything_untouched() {
        let mut c = load_cell_config();
        let before = c;
        let mut advanced = true;
        let mut ownership = SensorOwnership::default();
        let err = import_settings(r#"{"panelLowThresholds": [1, 2,]}"#, &mut c, &mut advanced, &mut ownership)
            .unwrap_err();
        assert!(matches!(err, ImportError::Json(_)));
        assert_eq!(c, before);
        assert!(advanced);
    }

    #[test]
    fn non_object_root_is_an_error() {
        assert_eq!(SettingsDocument::parse("[1, 2]").unwrap_err(), ImportError::NotAnObject);
    }
}
