//! Layout spoken by firmware 5 and newer

use super::wire::{WireReader, WireWriter};
use super::{PackedConfig, PanelSettings};
use crate::constants::wire::CURRENT_CONFIG_VERSION;

pub(super) fn read(r: &mut WireReader<'_>) -> PackedConfig {
    PackedConfig {
        master_version: r.u8(),
        config_version: r.u8(),
        flags: r.u8(),
        debounce_nodelay_ms: r.u16(),
        debounce_delay_ms: r.u16(),
        panel_debounce_us: r.u16(),
        auto_calibration_max_deviation: r.u8(),
        bad_sensor_minimum_delay_s: r.u8(),
        auto_calibration_averages_per_update: r.u16(),
        auto_calibration_samples_per_average: r.u16(),
        auto_calibration_max_tare: r.u16(),
        enabled_sensors: r.bytes(),
        auto_lights_timeout: r.u8(),
        step_color: r.bytes(),
        platform_strip_color: r.bytes(),
        auto_light_panel_mask: r.u16(),
        panel_rotation: r.u8(),
        panel_settings: std::array::from_fn(|_| read_panel(r)),
        pre_details_delay_ms: r.u8(),
        padding: r.bytes(),
    }
}

fn read_panel(r: &mut WireReader<'_>) -> PanelSettings {
    PanelSettings {
        load_cell_low: r.u8(),
        load_cell_high: r.u8(),
        fsr_low: r.bytes(),
        fsr_high: r.bytes(),
        combined_low: r.u16(),
        combined_high: r.u16(),
        reserved: r.u16(),
    }
}

pub(super) fn write(c: &PackedConfig, w: &mut WireWriter) {
    w.u8(c.master_version);
    w.u8(CURRENT_CONFIG_VERSION);
    w.u8(c.flags);
    w.u16(c.debounce_nodelay_ms);
    w.u16(c.debounce_delay_ms);
    w.u16(c.panel_debounce_us);
    w.u8(c.auto_calibration_max_deviation);
    w.u8(c.bad_sensor_minimum_delay_s);
    w.u16(c.auto_calibration_averages_per_update);
    w.u16(c.auto_calibration_samples_per_average);
    w.u16(c.auto_calibration_max_tare);
    w.bytes(&c.enabled_sensors);
    w.u8(c.auto_lights_timeout);
    w.bytes(&c.step_color);
    w.bytes(&c.platform_strip_color);
    w.u16(c.auto_light_panel_mask);
    w.u8(c.panel_rotation);
    for p in &c.panel_settings {
        w.u8(p.load_cell_low);
        w.u8(p.load_cell_high);
        w.bytes(&p.fsr_low);
        w.bytes(&p.fsr_high);
        w.u16(p.combined_low);
        w.u16(p.combined_high);
        w.u16(p.reserved);
    }
    w.u8(c.pre_details_delay_ms);
    w.bytes(&c.padding);
}
