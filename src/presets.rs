//! Named threshold presets and recognizing them in a pad's configuration

use std::fmt;
use std::str::FromStr;

use crate::codec::PackedConfig;
use crate::constants::panels;
use crate::constants::wire::{PER_PANEL_THRESHOLDS_VERSION, VERSION_UNSET};
use crate::error::UnknownPreset;
use crate::thresholds::sync_unified_thresholds;
use crate::types::{PanelAndSensor, ThresholdPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Low,
    Normal,
    High,
}

/// Canonical values of one preset: an edge pair for every non-center panel
/// and a center pair, for each storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetValues {
    pub load_cell_edge: ThresholdPair,
    pub load_cell_center: ThresholdPair,
    pub fsr_edge: ThresholdPair,
    pub fsr_center: ThresholdPair,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Low, Preset::Normal, Preset::High];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Low => "low",
            Preset::Normal => "normal",
            Preset::High => "high",
        }
    }

    pub fn values(self) -> PresetValues {
        // FSR values are the 8-bit form of the sensors' 10-bit readings.
        match self {
            Preset::Low => PresetValues {
                load_cell_edge: ThresholdPair::new(70, 80),
                load_cell_center: ThresholdPair::new(100, 120),
                fsr_edge: ThresholdPair::new(200, 218),
                fsr_center: ThresholdPair::new(211, 223),
            },
            Preset::Normal => PresetValues {
                load_cell_edge: ThresholdPair::new(33, 42),
                load_cell_center: ThresholdPair::new(35, 60),
                fsr_edge: ThresholdPair::new(162, 175),
                fsr_center: ThresholdPair::new(211, 223),
            },
            Preset::High => PresetValues {
                load_cell_edge: ThresholdPair::new(20, 25),
                load_cell_center: ThresholdPair::new(20, 30),
                fsr_edge: ThresholdPair::new(68, 75),
                fsr_center: ThresholdPair::new(68, 75),
            },
        }
    }

    /// Write this preset's thresholds to `config`, leaving everything else
    pub fn apply(self, config: &mut PackedConfig) {
        let v = self.values();
        let sources = [
            (panels::UP, v.load_cell_edge, v.fsr_edge),
            (panels::CARDINAL_SOURCE, v.load_cell_edge, v.fsr_edge),
            (panels::CORNER_SOURCE, v.load_cell_edge, v.fsr_edge),
            (panels::CENTER, v.load_cell_center, v.fsr_center),
        ];
        for (panel, load_cell, fsr) in sources {
            config.set_panel_thresholds(panel, load_cell);
            for sensor in PanelAndSensor::all_of(panel) {
                config.set_sensor_thresholds(sensor, fsr);
            }
        }
        sync_unified_thresholds(config);
    }

    /// The preset whose thresholds `config` carries exactly, if any
    pub fn classify(config: &PackedConfig) -> Option<Preset> {
        let mut config = *config;
        if is_legacy_unmirrored(&config) {
            sync_unified_thresholds(&mut config);
        }
        Preset::ALL.into_iter().find(|preset| {
            let mut reference = PackedConfig::default();
            preset.apply(&mut reference);
            same_thresholds(&config, &reference, config.fsr())
        })
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

/// Name of the matching preset, or an empty string
pub fn classify_name(config: &PackedConfig) -> &'static str {
    Preset::classify(config).map_or("", Preset::name)
}

/// Records from before per-panel thresholds only meaningfully store the
/// representative panels
fn is_legacy_unmirrored(config: &PackedConfig) -> bool {
    config.config_version == VERSION_UNSET || config.config_version < PER_PANEL_THRESHOLDS_VERSION
}

fn same_thresholds(a: &PackedConfig, b: &PackedConfig, fsr: bool) -> bool {
    (0..panels::COUNT).all(|panel| {
        if fsr {
            PanelAndSensor::all_of(panel).all(|s| a.sensor_thresholds(s) == b.sensor_thresholds(s))
        } else {
            a.panel_thresholds(panel) == b.panel_thresholds(panel)
        }
    })
}

/// True iff mirroring would change no threshold byte in either storage
pub fn are_unified_thresholds_synced(config: &PackedConfig) -> bool {
    let mut mirrored = *config;
    sync_unified_thresholds(&mut mirrored);
    mirrored.thresholds_equal(config)
}

/// Per-panel values have diverged on firmware that honors them, so the
/// advanced view must stay available
pub fn advanced_view_required(config: &PackedConfig) -> bool {
    let per_panel_firmware =
        config.master_version != VERSION_UNSET && config.master_version >= PER_PANEL_THRESHOLDS_VERSION;
    per_panel_firmware && !are_unified_thresholds_synced(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_legacy;
    use crate::constants::wire::{CONFIG_SIZE, CURRENT_CONFIG_VERSION};

    fn scrambled(fsr: bool) -> PackedConfig {
        let mut c = PackedConfig::default();
        c.master_version = 5;
        c.config_version = CURRENT_CONFIG_VERSION;
        c.set_fsr_flag(fsr);
        for panel in 0..panels::COUNT {
            c.set_panel_thresholds(panel, ThresholdPair::new(panel as u8, 200 - panel as u8));
            for s in PanelAndSensor::all_of(panel) {
                c.set_sensor_thresholds(s, ThresholdPair::new(s.sensor as u8, 9));
            }
        }
        c
    }

    #[test]
    fn apply_then_classify_recovers_preset() {
        for fsr in [false, true] {
            for preset in Preset::ALL {
                let mut c = scrambled(fsr);
                preset.apply(&mut c);
                assert_eq!(Preset::classify(&c), Some(preset), "{preset} fsr={fsr}");
            }
        }
    }

    #[test]
    fn apply_writes_mirrored_form() {
        let mut c = PackedConfig::default();
        Preset::Low.apply(&mut c);
        for panel in [0, 1, 2, 3, 5, 6, 7, 8] {
            assert_eq!(c.panel_thresholds(panel), ThresholdPair::new(70, 80));
        }
        assert_eq!(c.panel_thresholds(4), ThresholdPair::new(100, 120));
        assert!(are_unified_thresholds_synced(&c));
    }

    #[test]
    fn unknown_thresholds_classify_as_empty() {
        let c = scrambled(false);
        assert_eq!(Preset::classify(&c), None);
        assert_eq!(classify_name(&c), "");
    }

    #[test]
    fn legacy_config_is_mirrored_before_comparing() {
        // Only the representative panels were ever written by old firmware.
        let mut b = [0u8; CONFIG_SIZE];
        b[8..14].copy_from_slice(&[70, 80, 100, 120, 70, 80]);
        b[24..26].copy_from_slice(&[70, 80]);
        b[62] = 2;
        b[63] = 0xFF;
        b[74..84].copy_from_slice(&[1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
        let c = decode_legacy(&b);
        assert_eq!(Preset::classify(&c), Some(Preset::Low));
    }

    #[test]
    fn low_preset_on_blank_legacy_record() {
        let mut c = decode_legacy(&[0u8; CONFIG_SIZE]);
        c.config_version = VERSION_UNSET;
        Preset::Low.apply(&mut c);
        assert_eq!(classify_name(&c), "low");
    }

    #[test]
    fn current_config_is_not_mirrored_before_comparing() {
        let mut c = PackedConfig::default();
        c.config_version = CURRENT_CONFIG_VERSION;
        Preset::Normal.apply(&mut c);
        c.set_panel_thresholds(panels::LEFT, ThresholdPair::new(1, 2));
        assert_eq!(Preset::classify(&c), None);
    }

    #[test]
    fn unified_sync_detects_divergence() {
        let mut c = PackedConfig::default();
        c.master_version = 4;
        Preset::High.apply(&mut c);
        assert!(!advanced_view_required(&c));

        c.set_sensor_thresholds(PanelAndSensor::new(panels::DOWN_LEFT, 1), ThresholdPair::new(3, 4));
        assert!(!are_unified_thresholds_synced(&c));
        assert!(advanced_view_required(&c));

        c.master_version = VERSION_UNSET;
        assert!(!advanced_view_required(&c));
    }

    #[test]
    fn synced_iff_mirroring_is_a_no_op() {
        let c = scrambled(true);
        let mut m = c;
        sync_unified_thresholds(&mut m);
        assert_eq!(are_unified_thresholds_synced(&c), m == c);
        assert!(are_unified_thresholds_synced(&m));
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("normal".parse::<Preset>(), Ok(Preset::Normal));
        assert!("medium".parse::<Preset>().is_err());
    }
}
