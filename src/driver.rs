//! Boundary to the pad driver
//!
//! The driver owns the USB side and calls back from its own thread. This
//! crate only talks to it through [`Driver`]; [`NullDriver`] stands in when
//! no hardware is attached and [`MemoryDriver`] emulates two pads in memory.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::codec::{self, PackedConfig, WireLayout};
use crate::constants::wire::{CONFIG_SIZE, CURRENT_LAYOUT_MIN_FIRMWARE};
use crate::constants::{panels, pads, sensors};

/// Why the driver invoked the update callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// Something about the pad may have changed; re-read everything
    Updated,
    /// A factory reset finished. The config may look unchanged to a diff.
    FactoryResetComplete,
}

pub type UpdateCallback = Box<dyn Fn(usize, UpdateReason) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PadInfo {
    pub connected: bool,
    /// 32 hex digits
    pub serial: String,
    pub firmware_version: u16,
}

/// Raw configuration bytes as the pad reported them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawConfig {
    pub layout: WireLayout,
    pub bytes: [u8; CONFIG_SIZE],
}

impl RawConfig {
    pub fn decode(&self) -> PackedConfig {
        codec::decode_layout(self.layout, &self.bytes)
    }
}

/// What the pad streams back while a sensor test mode is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorTestMode {
    #[default]
    Off,
    UncalibratedValues,
    CalibratedValues,
    Noise,
    Tare,
}

impl SensorTestMode {
    /// Command byte sent to the pad
    pub fn code(self) -> u8 {
        match self {
            SensorTestMode::Off => 0,
            SensorTestMode::UncalibratedValues => b'0',
            SensorTestMode::CalibratedValues => b'1',
            SensorTestMode::Noise => b'2',
            SensorTestMode::Tare => b'3',
        }
    }
}

const SENSOR_COUNT: usize = panels::COUNT * sensors::PER_PANEL;

/// Per-sensor readings for the active test mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestModeData {
    /// False means the panel did not answer and its levels are zero
    pub have_data_from_panel: [bool; panels::COUNT],
    pub sensor_level: [i16; SENSOR_COUNT],
    pub bad_sensor_input: [bool; SENSOR_COUNT],
    pub dip_switch_per_panel: [i32; panels::COUNT],
    pub wrong_sensor_jumper: [bool; SENSOR_COUNT],
}

impl Default for TestModeData {
    fn default() -> Self {
        Self {
            have_data_from_panel: [false; panels::COUNT],
            sensor_level: [0; SENSOR_COUNT],
            bad_sensor_input: [false; SENSOR_COUNT],
            dip_switch_per_panel: [0; panels::COUNT],
            wrong_sensor_jumper: [false; SENSOR_COUNT],
        }
    }
}

impl TestModeData {
    fn panel_flags(&self, flags: &[bool; SENSOR_COUNT], panel: usize) -> bool {
        self.have_data_from_panel[panel]
            && flags[panel * sensors::PER_PANEL..(panel + 1) * sensors::PER_PANEL].iter().any(|&b| b)
    }

    pub fn any_sensors_on_panel_not_responding(&self, panel: usize) -> bool {
        self.panel_flags(&self.bad_sensor_input, panel)
    }

    pub fn any_bad_jumpers_on_panel(&self, panel: usize) -> bool {
        self.panel_flags(&self.wrong_sensor_jumper, panel)
    }
}

/// Pad driver. Calls never fail: an absent pad reads as disconnected with
/// neutral values and writes to it are dropped.
pub trait Driver: Send + Sync {
    fn info(&self, pad: usize) -> PadInfo;

    /// Bit `i` set while panel `i` is pressed
    fn input_state(&self, pad: usize) -> u16;

    fn config(&self, pad: usize) -> Option<RawConfig>;

    /// Asynchronous on real hardware; the pad applies it in the background
    fn set_config(&self, pad: usize, bytes: &[u8; CONFIG_SIZE]);

    fn test_data(&self, pad: usize) -> Option<TestModeData>;

    fn set_sensor_test_mode(&self, pad: usize, mode: SensorTestMode);

    fn factory_reset(&self, pad: usize);

    fn force_recalibration(&self, pad: usize);

    /// Size of the configuration struct the driver was built with
    fn config_size(&self) -> usize;

    /// `callback` may run on any thread, possibly with driver locks held.
    /// It must not call back into the driver.
    fn start_notifications(&self, callback: UpdateCallback);
}

/// Decoded configuration of one pad
pub fn read_config(driver: &dyn Driver, pad: usize) -> Option<PackedConfig> {
    driver.config(pad).map(|raw| raw.decode())
}

/// Encode (stamping the current schema version) and send a configuration
pub fn write_config(driver: &dyn Driver, pad: usize, config: &PackedConfig) {
    debug!(pad, "Writing configuration");
    driver.set_config(pad, &codec::encode(config));
}

/// No driver available. Everything reads as disconnected.
#[derive(Debug, Default)]
pub struct NullDriver;

impl Driver for NullDriver {
    fn info(&self, _pad: usize) -> PadInfo {
        PadInfo::default()
    }

    fn input_state(&self, _pad: usize) -> u16 {
        0
    }

    fn config(&self, _pad: usize) -> Option<RawConfig> {
        None
    }

    fn set_config(&self, _pad: usize, _bytes: &[u8; CONFIG_SIZE]) {}

    fn test_data(&self, _pad: usize) -> Option<TestModeData> {
        None
    }

    fn set_sensor_test_mode(&self, _pad: usize, _mode: SensorTestMode) {}

    fn factory_reset(&self, _pad: usize) {}

    fn force_recalibration(&self, _pad: usize) {}

    fn config_size(&self) -> usize {
        CONFIG_SIZE
    }

    fn start_notifications(&self, _callback: UpdateCallback) {}
}

#[derive(Debug, Clone)]
struct EmulatedPad {
    info: PadInfo,
    inputs: u16,
    config: RawConfig,
    factory_config: RawConfig,
    test_mode: SensorTestMode,
    test_data: TestModeData,
    recalibrations: u32,
}

#[derive(Default)]
struct MemoryState {
    pads: [Option<EmulatedPad>; pads::COUNT],
    callback: Option<Arc<UpdateCallback>>,
}

/// In-process emulation of two pads holding raw wire bytes
///
/// Callbacks run on the thread that caused them, after the internal lock
/// is released.
#[derive(Default)]
pub struct MemoryDriver {
    state: Mutex<MemoryState>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave pad state half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, pad: usize, reason: UpdateReason) {
        let callback = self.lock().callback.clone();
        if let Some(callback) = callback {
            (*callback)(pad, reason);
        }
    }

    /// Plug in a pad with the given firmware and stored configuration
    pub fn connect(&self, pad: usize, firmware_version: u16, config: RawConfig) {
        let connected = match self.lock().pads.get_mut(pad) {
            Some(slot) => {
                *slot = Some(EmulatedPad {
                    info: PadInfo {
                        connected: true,
                        serial: format!("{:032X}", pad + 1),
                        firmware_version,
                    },
                    inputs: 0,
                    config,
                    factory_config: config,
                    test_mode: SensorTestMode::Off,
                    test_data: TestModeData::default(),
                    recalibrations: 0,
                });
                true
            }
            None => false,
        };
        if !connected {
            warn!(pad, "Ignoring connect for unknown pad");
            return;
        }
        info!(pad, firmware_version, layout = %config.layout, "Emulated pad connected");
        self.notify(pad, UpdateReason::Updated);
    }

    /// Plug in a pad holding a decoded configuration, stored in the current layout
    pub fn connect_config(&self, pad: usize, firmware_version: u16, config: &PackedConfig) {
        let raw = RawConfig { layout: WireLayout::Current, bytes: codec::encode(config) };
        self.connect(pad, firmware_version.max(CURRENT_LAYOUT_MIN_FIRMWARE), raw);
    }

    pub fn disconnect(&self, pad: usize) {
        if let Some(slot) = self.lock().pads.get_mut(pad) {
            *slot = None;
        }
        self.notify(pad, UpdateReason::Updated);
    }

    pub fn set_inputs(&self, pad: usize, mask: u16) {
        self.with_pad(pad, |p| p.inputs = mask);
        self.notify(pad, UpdateReason::Updated);
    }

    pub fn set_test_data(&self, pad: usize, data: TestModeData) {
        self.with_pad(pad, |p| p.test_data = data);
        self.notify(pad, UpdateReason::Updated);
    }

    /// Raw bytes currently stored for a pad
    pub fn raw_config(&self, pad: usize) -> Option<RawConfig> {
        self.lock().pads.get(pad).and_then(|p| p.as_ref()).map(|p| p.config)
    }

    pub fn sensor_test_mode(&self, pad: usize) -> Option<SensorTestMode> {
        self.lock().pads.get(pad).and_then(|p| p.as_ref()).map(|p| p.test_mode)
    }

    pub fn recalibrations(&self, pad: usize) -> u32 {
        self.lock().pads.get(pad).and_then(|p| p.as_ref()).map_or(0, |p| p.recalibrations)
    }

    /// Run `f` on a connected pad; false if the pad is absent
    fn with_pad(&self, pad: usize, f: impl FnOnce(&mut EmulatedPad)) -> bool {
        match self.lock().pads.get_mut(pad).and_then(|p| p.as_mut()) {
            Some(p) => {
                f(p);
                true
            }
            None => false,
        }
    }
}

impl Driver for MemoryDriver {
    fn info(&self, pad: usize) -> PadInfo {
        self.lock()
            .pads
            .get(pad)
            .and_then(|p| p.as_ref())
            .map(|p| p.info.clone())
            .unwrap_or_default()
    }

    fn input_state(&self, pad: usize) -> u16 {
        self.lock().pads.get(pad).and_then(|p| p.as_ref()).map_or(0, |p| p.inputs)
    }

    fn config(&self, pad: usize) -> Option<RawConfig> {
        self.raw_config(pad)
    }

    fn set_config(&self, pad: usize, bytes: &[u8; CONFIG_SIZE]) {
        // The emulator always stores what it was sent, in the current layout.
        let stored = self.with_pad(pad, |p| {
            p.config = RawConfig { layout: WireLayout::Current, bytes: *bytes };
        });
        if stored {
            self.notify(pad, UpdateReason::Updated);
        } else {
            debug!(pad, "Dropping configuration write to disconnected pad");
        }
    }

    fn test_data(&self, pad: usize) -> Option<TestModeData> {
        self.lock()
            .pads
            .get(pad)
            .and_then(|p| p.as_ref())
            .filter(|p| p.test_mode != SensorTestMode::Off)
            .map(|p| p.test_data.clone())
    }

    fn set_sensor_test_mode(&self, pad: usize, mode: SensorTestMode) {
        if self.with_pad(pad, |p| p.test_mode = mode) {
            self.notify(pad, UpdateReason::Updated);
        }
    }

    fn factory_reset(&self, pad: usize) {
        if self.with_pad(pad, |p| p.config = p.factory_config) {
            self.notify(pad, UpdateReason::FactoryResetComplete);
        }
    }

    fn force_recalibration(&self, pad: usize) {
        self.with_pad(pad, |p| p.recalibrations += 1);
    }

    fn config_size(&self) -> usize {
        CONFIG_SIZE
    }

    fn start_notifications(&self, callback: UpdateCallback) {
        self.lock().callback = Some(Arc::new(callback));
    }
}
