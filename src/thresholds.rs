//! Sensor ownership: which physical sensors each threshold control edits
//!
//! Priority, highest first: custom sensors, then the inner/outer sensor
//! groups, then the direction controls. A lower-priority control never
//! touches a sensor a higher-priority one owns.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::codec::PackedConfig;
use crate::constants::{panels, sensors};
use crate::error::UnknownControl;
use crate::json::{self, JsonValue};
use crate::types::{PanelAndSensor, ThresholdPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    UpLeft,
    Up,
    UpRight,
    Left,
    Center,
    Right,
    DownLeft,
    Down,
    DownRight,
    Cardinal,
    Corner,
    InnerSensors,
    OuterSensors,
    CustomSensors,
}

impl Control {
    pub const ALL: [Control; 14] = [
        Control::UpLeft,
        Control::Up,
        Control::UpRight,
        Control::Left,
        Control::Center,
        Control::Right,
        Control::DownLeft,
        Control::Down,
        Control::DownRight,
        Control::Cardinal,
        Control::Corner,
        Control::InnerSensors,
        Control::OuterSensors,
        Control::CustomSensors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Control::UpLeft => "up-left",
            Control::Up => "up",
            Control::UpRight => "up-right",
            Control::Left => "left",
            Control::Center => "center",
            Control::Right => "right",
            Control::DownLeft => "down-left",
            Control::Down => "down",
            Control::DownRight => "down-right",
            Control::Cardinal => "cardinal",
            Control::Corner => "corner",
            Control::InnerSensors => "inner-sensors",
            Control::OuterSensors => "outer-sensors",
            Control::CustomSensors => "custom-sensors",
        }
    }

    /// Panel a panel-level control stores its value on. Cardinal and corner
    /// store on one representative panel and mirror outward.
    pub fn panel(self) -> Option<usize> {
        Some(match self {
            Control::UpLeft => panels::UP_LEFT,
            Control::Up => panels::UP,
            Control::UpRight => panels::UP_RIGHT,
            Control::Left => panels::LEFT,
            Control::Center => panels::CENTER,
            Control::Right => panels::RIGHT,
            Control::DownLeft => panels::DOWN_LEFT,
            Control::Down => panels::DOWN,
            Control::DownRight => panels::DOWN_RIGHT,
            Control::Cardinal => panels::CARDINAL_SOURCE,
            Control::Corner => panels::CORNER_SOURCE,
            Control::InnerSensors | Control::OuterSensors | Control::CustomSensors => return None,
        })
    }

    pub fn is_sensor_group(self) -> bool {
        matches!(self, Control::InnerSensors | Control::OuterSensors | Control::CustomSensors)
    }

    /// Shown in simple (non-advanced) mode
    pub fn in_simple_mode(self) -> bool {
        matches!(self, Control::Up | Control::Center | Control::Cardinal | Control::Corner)
    }

    /// Whether the control exists in the given view mode. Cardinal and
    /// corner only exist in simple mode; the other panel controls that
    /// simple mode hides would be overwritten by mirroring there.
    pub fn shown_in_mode(self, advanced_mode: bool) -> bool {
        match self {
            c if c.is_sensor_group() => true,
            Control::Cardinal | Control::Corner => !advanced_mode,
            c => advanced_mode || c.in_simple_mode(),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Control {
    type Err = UnknownControl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Control::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownControl(s.to_string()))
    }
}

/// Sensors facing the middle of the pad, one per edge panel
pub const INNER_SENSORS: [PanelAndSensor; 4] = [
    PanelAndSensor::new(panels::UP, sensors::DOWN),
    PanelAndSensor::new(panels::LEFT, sensors::RIGHT),
    PanelAndSensor::new(panels::RIGHT, sensors::LEFT),
    PanelAndSensor::new(panels::DOWN, sensors::UP),
];

/// Sensors facing away from the middle of the pad, one per edge panel
pub const OUTER_SENSORS: [PanelAndSensor; 4] = [
    PanelAndSensor::new(panels::UP, sensors::UP),
    PanelAndSensor::new(panels::LEFT, sensors::LEFT),
    PanelAndSensor::new(panels::RIGHT, sensors::RIGHT),
    PanelAndSensor::new(panels::DOWN, sensors::DOWN),
];

/// Panels that copy `panel`'s thresholds in simple mode
pub fn mirror_targets(panel: usize) -> &'static [usize] {
    match panel {
        panels::CARDINAL_SOURCE => &panels::CARDINAL_MIRRORS,
        panels::CORNER_SOURCE => &panels::CORNER_MIRRORS,
        _ => &[],
    }
}

/// Broadcast the cardinal and corner representatives to their mirror
/// panels, in both threshold storages
pub fn sync_unified_thresholds(config: &mut PackedConfig) {
    for source in [panels::CARDINAL_SOURCE, panels::CORNER_SOURCE] {
        for &target in mirror_targets(source) {
            config.copy_panel_thresholds(source, target);
        }
    }
}

/// User-picked sensors edited by the custom-sensors control. Kept locally,
/// never on the pad.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomSensorList {
    sensors: Vec<PanelAndSensor>,
}

impl CustomSensorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[PanelAndSensor] {
        &self.sensors
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn contains(&self, sensor: PanelAndSensor) -> bool {
        self.sensors.contains(&sensor)
    }

    /// Returns false if already present
    pub fn add(&mut self, sensor: PanelAndSensor) -> bool {
        if self.contains(sensor) {
            return false;
        }
        self.sensors.push(sensor);
        true
    }

    /// Returns false if not present
    pub fn remove(&mut self, sensor: PanelAndSensor) -> bool {
        let before = self.sensors.len();
        self.sensors.retain(|s| *s != sensor);
        self.sensors.len() != before
    }

    /// Returns whether the sensor is in the list afterwards
    pub fn toggle(&mut self, sensor: PanelAndSensor) -> bool {
        if !self.remove(sensor) {
            self.sensors.push(sensor);
            true
        } else {
            false
        }
    }

    /// `[[panel, sensor], ...]`
    pub fn to_json(&self) -> JsonValue {
        self.sensors
            .iter()
            .map(|s| JsonValue::from_iter([s.panel, s.sensor]))
            .collect()
    }

    /// Lenient: entries that are not in-range `[panel, sensor]` pairs are
    /// skipped and duplicates collapsed
    pub fn from_json(value: &JsonValue) -> Self {
        let mut list = Self::new();
        for entry in value.as_array().unwrap_or_default() {
            let pair = entry.as_array().unwrap_or_default();
            let sensor = match pair {
                [panel, sensor, ..] => panel
                    .as_i64()
                    .zip(sensor.as_i64())
                    .and_then(|(p, s)| PanelAndSensor::checked(p, s)),
                _ => None,
            };
            match sensor {
                Some(sensor) => {
                    list.add(sensor);
                }
                None => debug!(?entry, "Skipping malformed custom sensor entry"),
            }
        }
        list
    }

    /// Compact-on-disk form stored in preferences
    pub fn encode(&self) -> String {
        json::serialize(&self.to_json())
    }

    /// Inverse of [`encode`](Self::encode). Corrupt text yields an empty list.
    pub fn decode(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::new();
        }
        match json::parse(text) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable custom sensor list");
                Self::new()
            }
        }
    }
}

impl FromIterator<PanelAndSensor> for CustomSensorList {
    fn from_iter<I: IntoIterator<Item = PanelAndSensor>>(iter: I) -> Self {
        let mut list = Self::new();
        for sensor in iter {
            list.add(sensor);
        }
        list
    }
}

/// The persisted flags that decide ownership, independent of any pad
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SensorOwnership {
    pub use_inner_sensor_thresholds: bool,
    pub use_outer_sensor_thresholds: bool,
    pub custom_sensors: CustomSensorList,
}

impl SensorOwnership {
    /// Sensors `control` edits. With `include_overridden`, returns what it
    /// would own if no higher-priority control or disabled group interfered.
    pub fn owned(&self, control: Control, advanced_mode: bool, include_overridden: bool) -> Vec<PanelAndSensor> {
        let mut result = self.raw(control, advanced_mode, include_overridden);
        if include_overridden {
            return result;
        }

        let overriding: &[Control] = match control {
            Control::CustomSensors => &[],
            Control::InnerSensors | Control::OuterSensors => &[Control::CustomSensors],
            _ => &[Control::InnerSensors, Control::OuterSensors, Control::CustomSensors],
        };
        for &higher in overriding {
            let taken = self.raw(higher, advanced_mode, false);
            result.retain(|s| !taken.contains(s));
        }
        result
    }

    fn raw(&self, control: Control, advanced_mode: bool, include_overridden: bool) -> Vec<PanelAndSensor> {
        match control {
            Control::InnerSensors if self.use_inner_sensor_thresholds || include_overridden => INNER_SENSORS.to_vec(),
            Control::OuterSensors if self.use_outer_sensor_thresholds || include_overridden => OUTER_SENSORS.to_vec(),
            Control::InnerSensors | Control::OuterSensors => Vec::new(),
            Control::CustomSensors => self.custom_sensors.as_slice().to_vec(),
            Control::Cardinal | Control::Corner if advanced_mode => Vec::new(),
            c if !advanced_mode && !c.in_simple_mode() => Vec::new(),
            c => {
                let Some(panel) = c.panel() else {
                    return Vec::new();
                };
                let mirrors = if advanced_mode { &[][..] } else { mirror_targets(panel) };
                std::iter::once(panel)
                    .chain(mirrors.iter().copied())
                    .flat_map(PanelAndSensor::all_of)
                    .collect()
            }
        }
    }

    /// Copy the first owned sensor's pair across each control's owned set.
    /// Only pressure-sensor pads have per-sensor storage; others are left
    /// alone. Returns whether anything changed.
    pub fn sync_owned_thresholds(&self, config: &mut PackedConfig, advanced_mode: bool) -> bool {
        if !config.fsr() {
            return false;
        }
        let before = *config;
        for control in Control::ALL {
            let owned = self.owned(control, advanced_mode, false);
            let Some(&first) = owned.first() else {
                continue;
            };
            let pair = config.sensor_thresholds(first);
            for &sensor in &owned[1..] {
                config.set_sensor_thresholds(sensor, pair);
            }
        }
        *config != before
    }

    /// Current value of a control, read from the storage the pad uses
    pub fn control_thresholds(&self, config: &PackedConfig, control: Control, advanced_mode: bool) -> Option<ThresholdPair> {
        if config.fsr() {
            let owned = self.owned(control, advanced_mode, false);
            owned.first().map(|&s| config.sensor_thresholds(s))
        } else {
            control
                .panel()
                .filter(|_| control.shown_in_mode(advanced_mode))
                .map(|panel| config.panel_thresholds(panel))
        }
    }

    /// Write a control's value. Pressure-sensor pads get it on every owned
    /// sensor; load-cell pads on the control's panel, mirrored outward in
    /// simple mode. Returns false if the control has nothing to write to,
    /// including panel controls that don't exist in the current mode.
    pub fn set_control_thresholds(
        &self,
        config: &mut PackedConfig,
        control: Control,
        pair: ThresholdPair,
        advanced_mode: bool,
    ) -> bool {
        if config.fsr() {
            let owned = self.owned(control, advanced_mode, false);
            for &sensor in &owned {
                config.set_sensor_thresholds(sensor, pair);
            }
            return !owned.is_empty();
        }

        let Some(panel) = control.panel().filter(|_| control.shown_in_mode(advanced_mode)) else {
            return false;
        };
        config.set_panel_thresholds(panel, pair);
        if !advanced_mode {
            sync_unified_thresholds(config);
        }
        true
    }

    /// Whether a control is worth showing for this pad: it must be shown in
    /// the current mode and touch at least one enabled panel
    pub fn control_visible(&self, config: &PackedConfig, control: Control, advanced_mode: bool) -> bool {
        if control.is_sensor_group() {
            return config.fsr();
        }
        let enabled = config.enabled_panels();
        self.owned(control, advanced_mode, true).iter().any(|s| enabled[s.panel])
    }
}
