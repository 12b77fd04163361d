//! Canonical pad configuration record and its fixed-size wire format
//!
//! Every schema revision encodes to exactly [`CONFIG_SIZE`] bytes. Each
//! layout has its own decoder producing the same [`PackedConfig`]; the
//! encoder only ever emits the current layout and stamps
//! [`CURRENT_CONFIG_VERSION`].

mod current;
mod legacy;
mod wire;

use std::fmt;

use tracing::{debug, error};

use crate::color::Rgb;
use crate::constants::lights;
use crate::constants::panels;
use crate::constants::wire::{
    CONFIG_SIZE, CURRENT_CONFIG_VERSION, CURRENT_LAYOUT_MIN_FIRMWARE, ENABLED_SENSORS_SIZE,
    FLAG_FSR, FSR_MIN_MASTER_VERSION, LIGHT_ALL_PANELS,
};
use crate::error::CodecError;
use crate::types::{PanelAndSensor, ThresholdPair};

use wire::{WireReader, WireWriter};

/// Which byte layout a raw configuration buffer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireLayout {
    /// Firmware older than 5
    Legacy,
    Current,
}

impl WireLayout {
    pub fn for_firmware(firmware_version: u16) -> Self {
        if firmware_version >= CURRENT_LAYOUT_MIN_FIRMWARE {
            WireLayout::Current
        } else {
            WireLayout::Legacy
        }
    }
}

impl fmt::Display for WireLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireLayout::Legacy => f.write_str("legacy"),
            WireLayout::Current => f.write_str("current"),
        }
    }
}

/// Per-panel thresholds. Load-cell pads use the single pair; pressure-sensor
/// pads use one pair per sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelSettings {
    pub load_cell_low: u8,
    pub load_cell_high: u8,
    pub fsr_low: [u8; 4],
    pub fsr_high: [u8; 4],
    pub combined_low: u16,
    pub combined_high: u16,
    pub reserved: u16,
}

/// One pad's full configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedConfig {
    pub master_version: u8,
    pub config_version: u8,
    pub flags: u8,
    pub debounce_nodelay_ms: u16,
    pub debounce_delay_ms: u16,
    pub panel_debounce_us: u16,
    pub auto_calibration_max_deviation: u8,
    pub bad_sensor_minimum_delay_s: u8,
    pub auto_calibration_averages_per_update: u16,
    pub auto_calibration_samples_per_average: u16,
    pub auto_calibration_max_tare: u16,
    /// Enabled panels, two per byte: high nibble even panel, low nibble odd panel
    pub enabled_sensors: [u8; ENABLED_SENSORS_SIZE],
    pub auto_lights_timeout: u8,
    /// Hardware-scaled RGB per panel
    pub step_color: [u8; panels::COUNT * lights::CHANNELS],
    pub platform_strip_color: [u8; lights::CHANNELS],
    pub auto_light_panel_mask: u16,
    pub panel_rotation: u8,
    pub panel_settings: [PanelSettings; panels::COUNT],
    pub pre_details_delay_ms: u8,
    pub padding: [u8; 49],
}

impl Default for PackedConfig {
    fn default() -> Self {
        Self {
            master_version: 0,
            config_version: 0,
            flags: 0,
            debounce_nodelay_ms: 0,
            debounce_delay_ms: 0,
            panel_debounce_us: 0,
            auto_calibration_max_deviation: 0,
            bad_sensor_minimum_delay_s: 0,
            auto_calibration_averages_per_update: 0,
            auto_calibration_samples_per_average: 0,
            auto_calibration_max_tare: 0,
            enabled_sensors: [0; ENABLED_SENSORS_SIZE],
            auto_lights_timeout: 0,
            step_color: [0; panels::COUNT * lights::CHANNELS],
            platform_strip_color: [0; lights::CHANNELS],
            auto_light_panel_mask: 0,
            panel_rotation: 0,
            panel_settings: [PanelSettings::default(); panels::COUNT],
            pre_details_delay_ms: 0,
            padding: [0; 49],
        }
    }
}

impl PackedConfig {
    /// True for pressure-sensor hardware (four threshold pairs per panel)
    pub fn fsr(&self) -> bool {
        self.master_version >= FSR_MIN_MASTER_VERSION && self.flags & FLAG_FSR != 0
    }

    pub fn set_fsr_flag(&mut self, enabled: bool) {
        if enabled {
            self.flags |= FLAG_FSR;
        } else {
            self.flags &= !FLAG_FSR;
        }
    }

    /// Load-cell pair of one panel
    pub fn panel_thresholds(&self, panel: usize) -> ThresholdPair {
        let p = &self.panel_settings[panel];
        ThresholdPair::new(p.load_cell_low, p.load_cell_high)
    }

    pub fn set_panel_thresholds(&mut self, panel: usize, pair: ThresholdPair) {
        let p = &mut self.panel_settings[panel];
        p.load_cell_low = pair.low;
        p.load_cell_high = pair.high;
    }

    /// Pressure-sensor pair of one sensor
    pub fn sensor_thresholds(&self, at: PanelAndSensor) -> ThresholdPair {
        let p = &self.panel_settings[at.panel];
        ThresholdPair::new(p.fsr_low[at.sensor], p.fsr_high[at.sensor])
    }

    pub fn set_sensor_thresholds(&mut self, at: PanelAndSensor, pair: ThresholdPair) {
        let p = &mut self.panel_settings[at.panel];
        p.fsr_low[at.sensor] = pair.low;
        p.fsr_high[at.sensor] = pair.high;
    }

    /// Copy every threshold of `from` onto `to`, in both storages
    pub fn copy_panel_thresholds(&mut self, from: usize, to: usize) {
        let src = self.panel_settings[from];
        let dst = &mut self.panel_settings[to];
        dst.load_cell_low = src.load_cell_low;
        dst.load_cell_high = src.load_cell_high;
        dst.fsr_low = src.fsr_low;
        dst.fsr_high = src.fsr_high;
    }

    /// Load-cell and pressure-sensor thresholds of every panel are equal
    pub fn thresholds_equal(&self, other: &PackedConfig) -> bool {
        self.panel_settings.iter().zip(other.panel_settings.iter()).all(|(a, b)| {
            a.load_cell_low == b.load_cell_low
                && a.load_cell_high == b.load_cell_high
                && a.fsr_low == b.fsr_low
                && a.fsr_high == b.fsr_high
        })
    }

    pub fn copy_thresholds_from(&mut self, other: &PackedConfig) {
        for (dst, src) in self.panel_settings.iter_mut().zip(other.panel_settings.iter()) {
            dst.load_cell_low = src.load_cell_low;
            dst.load_cell_high = src.load_cell_high;
            dst.fsr_low = src.fsr_low;
            dst.fsr_high = src.fsr_high;
        }
    }

    pub fn enabled_panels(&self) -> [bool; panels::COUNT] {
        std::array::from_fn(|panel| self.enabled_sensors[panel / 2] & nibble(panel) != 0)
    }

    pub fn set_enabled_panels(&mut self, enabled: [bool; panels::COUNT]) {
        self.enabled_sensors = [0; ENABLED_SENSORS_SIZE];
        for (panel, on) in enabled.into_iter().enumerate() {
            if on {
                self.enabled_sensors[panel / 2] |= nibble(panel);
            }
        }
    }

    pub fn first_enabled_panel(&self) -> Option<usize> {
        self.enabled_panels().iter().position(|&on| on)
    }

    /// UI color of a panel, converted back from the hardware range
    pub fn step_color(&self, panel: usize) -> Rgb {
        let start = panel * lights::CHANNELS;
        Rgb::from_slice(&self.step_color[start..start + lights::CHANNELS]).unscaled()
    }

    /// Store a UI color, scaling it to the hardware range
    pub fn set_step_color(&mut self, panel: usize, color: Rgb) {
        let start = panel * lights::CHANNELS;
        self.step_color[start..start + lights::CHANNELS].copy_from_slice(&color.scaled().to_array());
    }

    pub fn light_all_panels_mode(&self) -> bool {
        self.auto_light_panel_mask == LIGHT_ALL_PANELS
    }

    pub fn set_light_all_panels_mode(&mut self, enable: bool) {
        if enable {
            self.auto_light_panel_mask = LIGHT_ALL_PANELS;
        } else {
            self.refresh_auto_light_panel_mask(false);
        }
    }

    /// Point the auto-light mask at the enabled panels. Call after editing
    /// `enabled_sensors`. With `only_if_not_all`, "light all panels" is left alone.
    pub fn refresh_auto_light_panel_mask(&mut self, only_if_not_all: bool) {
        if only_if_not_all && self.light_all_panels_mode() {
            return;
        }
        self.auto_light_panel_mask = self
            .enabled_panels()
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0u16, |mask, (panel, _)| mask | (1 << panel));
    }
}

fn nibble(panel: usize) -> u8 {
    if panel % 2 == 0 { 0xF0 } else { 0x0F }
}

/// Encode in the current layout, stamping the newest schema version
pub fn encode(config: &PackedConfig) -> [u8; CONFIG_SIZE] {
    let mut w = WireWriter::new();
    current::write(config, &mut w);
    w.into_bytes()
}

/// Decode a current-layout buffer
pub fn decode(bytes: &[u8; CONFIG_SIZE]) -> PackedConfig {
    current::read(&mut WireReader::new(bytes))
}

/// Decode a buffer written by firmware older than 5
pub fn decode_legacy(bytes: &[u8; CONFIG_SIZE]) -> PackedConfig {
    legacy::read(&mut WireReader::new(bytes))
}

pub fn decode_layout(layout: WireLayout, bytes: &[u8; CONFIG_SIZE]) -> PackedConfig {
    match layout {
        WireLayout::Current => decode(bytes),
        WireLayout::Legacy => decode_legacy(bytes),
    }
}

/// Decode a buffer of unchecked length, e.g. one read from a file
pub fn decode_slice(layout: WireLayout, bytes: &[u8]) -> Result<PackedConfig, CodecError> {
    let fixed: &[u8; CONFIG_SIZE] = bytes.try_into().map_err(|_| CodecError::Length {
        expected: CONFIG_SIZE,
        actual: bytes.len(),
    })?;
    Ok(decode_layout(layout, fixed))
}

/// Startup integrity check. Any mismatch between the codec's layouts and
/// the driver's notion of the struct size is fatal.
pub fn verify_wire_size(driver_config_size: usize) -> Result<(), CodecError> {
    let mut zero = PackedConfig::default();
    zero.config_version = CURRENT_CONFIG_VERSION;

    let mut w = WireWriter::new();
    current::write(&zero, &mut w);
    if w.overrun() || w.position() != CONFIG_SIZE {
        error!(written = w.position(), expected = CONFIG_SIZE, "Encoder layout size mismatch");
        return Err(CodecError::EncodedSize { written: w.position(), expected: CONFIG_SIZE });
    }
    let bytes = w.into_bytes();

    for layout in [WireLayout::Current, WireLayout::Legacy] {
        let mut r = WireReader::new(&bytes);
        let decoded = match layout {
            WireLayout::Current => current::read(&mut r),
            WireLayout::Legacy => legacy::read(&mut r),
        };
        if r.overrun() || r.position() != CONFIG_SIZE {
            error!(%layout, consumed = r.position(), expected = CONFIG_SIZE, "Decoder layout size mismatch");
            return Err(CodecError::DecodedSize { layout, consumed: r.position(), expected: CONFIG_SIZE });
        }
        if layout == WireLayout::Current && decoded != zero {
            error!("Zero configuration did not survive a round trip");
            return Err(CodecError::RoundTrip);
        }
    }

    if driver_config_size != CONFIG_SIZE {
        error!(driver = driver_config_size, expected = CONFIG_SIZE, "Driver disagrees on configuration size");
        return Err(CodecError::DriverSize { driver: driver_config_size, expected: CONFIG_SIZE });
    }

    debug!(size = CONFIG_SIZE, "Configuration wire size verified");
    Ok(())
}
