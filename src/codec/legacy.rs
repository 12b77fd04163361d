//! Layout spoken by firmware older than 5
//!
//! Thresholds are scattered through the struct in the order panels gained
//! independent settings. Fields this layout lacks stay zero.

use super::wire::WireReader;
use super::PackedConfig;
use crate::constants::panels;
use crate::constants::wire::{
    CONFIG_SIZE, DEBOUNCE_DELAY_VERSION, PER_PANEL_THRESHOLDS_VERSION, VERSION_UNSET,
};

const MASTER_DEBOUNCE: usize = 6;
const FIRST_PANELS: usize = 8;
const PANEL_DEBOUNCE: usize = 14;
const MAX_DEVIATION: usize = 18;
const UP_PANEL: usize = 24;
const ENABLED_SENSORS: usize = 26;
const PANEL_ROTATION: usize = 59;
const VERSIONS: usize = 62;
const LATER_PANELS: usize = 74;
const DEBOUNCE_DELAY: usize = 84;

pub(super) fn read(r: &mut WireReader<'_>) -> PackedConfig {
    let mut c = PackedConfig::default();

    r.seek(MASTER_DEBOUNCE);
    c.debounce_nodelay_ms = r.u16();

    r.seek(FIRST_PANELS);
    for panel in [panels::DOWN, panels::CENTER, panels::UP_RIGHT] {
        read_pair(r, &mut c, panel);
    }

    r.seek(PANEL_DEBOUNCE);
    c.panel_debounce_us = r.u16();
    let _calibration_period_ms = r.u16();

    r.seek(MAX_DEVIATION);
    c.auto_calibration_max_deviation = r.u8();
    c.bad_sensor_minimum_delay_s = r.u8();
    c.auto_calibration_averages_per_update = r.u16();

    r.seek(UP_PANEL);
    read_pair(r, &mut c, panels::UP);

    r.seek(ENABLED_SENSORS);
    c.enabled_sensors = r.bytes();
    c.auto_lights_timeout = r.u8();
    c.step_color = r.bytes();

    r.seek(PANEL_ROTATION);
    c.panel_rotation = r.u8();
    c.auto_calibration_samples_per_average = r.u16();

    r.seek(VERSIONS);
    let master_version = r.u8();
    let config_version = r.u8();

    // Carried through verbatim so the preset matcher can spot legacy records.
    c.master_version = master_version;
    c.config_version = config_version;

    r.seek(LATER_PANELS);
    let per_panel = config_version != VERSION_UNSET && config_version >= PER_PANEL_THRESHOLDS_VERSION;
    for panel in [panels::UP_LEFT, panels::LEFT, panels::RIGHT, panels::DOWN_LEFT, panels::DOWN_RIGHT] {
        if per_panel {
            read_pair(r, &mut c, panel);
        } else {
            r.bytes::<2>();
        }
    }

    r.seek(DEBOUNCE_DELAY);
    let debounce_delay_ms = r.u16();
    if per_panel && config_version >= DEBOUNCE_DELAY_VERSION {
        c.debounce_delay_ms = debounce_delay_ms;
    }

    r.seek(CONFIG_SIZE);
    c
}

fn read_pair(r: &mut WireReader<'_>, c: &mut PackedConfig, panel: usize) {
    let p = &mut c.panel_settings[panel];
    p.load_cell_low = r.u8();
    p.load_cell_high = r.u8();
}
