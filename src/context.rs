//! Application context
//!
//! Owns the notifier and the local preferences and is handed to whatever
//! needs them. Every edit follows the same path: copy each active pad's
//! config, modify it, write it back, then announce one configuration change.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::active_pad::{self, SelectedPad};
use crate::codec::{self, PackedConfig};
use crate::color::Rgb;
use crate::config::Preferences;
use crate::constants::{pads, panels};
use crate::device::{ChangeArgs, ChangeNotifier, PadSnapshot, SourceId, Subscription};
use crate::driver::{self, Driver, SensorTestMode};
use crate::presets::{self, Preset};
use crate::settings_file::{self, SettingsDocument};
use crate::thresholds::{self, Control, SensorOwnership};
use crate::types::{PanelAndSensor, ThresholdPair};

pub struct AppContext {
    notifier: ChangeNotifier,
    preferences: Preferences,
    ownership: SensorOwnership,
    /// Where preferences are saved on change; `None` keeps them in memory
    preferences_path: Option<PathBuf>,
}

impl AppContext {
    /// Fails if the driver and this codec disagree on the configuration
    /// layout. Nothing read from the driver could be trusted in that case.
    pub fn new(driver: Arc<dyn Driver>, preferences: Preferences, preferences_path: Option<PathBuf>) -> Result<Self> {
        let driver_size = driver.config_size();
        if let Err(e) = codec::verify_wire_size(driver_size) {
            error!(error = %e, driver_size, "Configuration layout integrity check failed");
            return Err(e).context("Driver configuration layout does not match this build");
        }

        let ownership = preferences.ownership();
        info!(
            advanced_mode = preferences.advanced_mode,
            selected_pad = %preferences.selected_pad,
            custom_sensors = ownership.custom_sensors.len(),
            "Context ready"
        );
        Ok(Self { notifier: ChangeNotifier::new(driver), preferences, ownership, preferences_path })
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        self.notifier.driver()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn ownership(&self) -> &SensorOwnership {
        &self.ownership
    }

    pub fn advanced_mode(&self) -> bool {
        self.preferences.advanced_mode
    }

    pub fn selected_pad(&self) -> SelectedPad {
        self.preferences.selected_pad
    }

    pub fn state(&self) -> [PadSnapshot; pads::COUNT] {
        self.notifier.get_state()
    }

    pub fn pump(&self) -> usize {
        self.notifier.pump()
    }

    pub fn pump_blocking(&self, timeout: Duration) -> usize {
        self.notifier.pump_blocking(timeout)
    }

    pub fn subscribe(
        &self,
        callback: impl FnMut(&ChangeArgs) + 'static,
        refresh_on_input_change: bool,
        refresh_on_test_data_change: bool,
    ) -> Subscription {
        self.notifier.subscribe(callback, refresh_on_input_change, refresh_on_test_data_change)
    }

    pub fn active_pads(&self) -> Vec<(usize, PackedConfig)> {
        active_pad::active_pads(&self.state(), self.preferences.selected_pad)
    }

    pub fn first_active_pad_config(&self) -> PackedConfig {
        active_pad::first_active_pad_config(&self.state(), self.preferences.selected_pad)
    }

    /// Read-modify-write every active pad, then notify once.
    /// Returns the number of pads written.
    fn edit_active_pads(&self, source: Option<SourceId>, mut edit: impl FnMut(&mut PackedConfig)) -> usize {
        let active = self.active_pads();
        if active.is_empty() {
            return 0;
        }
        let driver = self.driver().as_ref();
        for (pad, mut config) in active.iter().copied() {
            edit(&mut config);
            driver::write_config(driver, pad, &config);
        }
        self.notifier.fire_configuration_changed(source);
        active.len()
    }

    fn save_preferences(&self) -> Result<()> {
        match &self.preferences_path {
            Some(path) => self.preferences.save_to(path),
            None => Ok(()),
        }
    }

    fn set_ownership(&mut self, ownership: SensorOwnership) -> Result<()> {
        self.ownership = ownership;
        self.preferences.set_ownership(&self.ownership);
        self.save_preferences()?;
        self.sync_owned_thresholds();
        Ok(())
    }

    pub fn apply_preset(&self, preset: Preset) -> usize {
        info!(%preset, "Applying preset");
        self.edit_active_pads(None, |config| preset.apply(config))
    }

    pub fn current_preset(&self) -> Option<Preset> {
        Preset::classify(&self.first_active_pad_config())
    }

    pub fn control_thresholds(&self, control: Control) -> Option<ThresholdPair> {
        self.ownership.control_thresholds(&self.first_active_pad_config(), control, self.advanced_mode())
    }

    /// Returns the number of pads the control could be applied to
    pub fn set_control_thresholds(&self, control: Control, pair: ThresholdPair, source: Option<SourceId>) -> usize {
        info!(%control, %pair, "Setting thresholds");
        let advanced = self.advanced_mode();
        let mut applied = 0;
        self.edit_active_pads(source, |config| {
            if self.ownership.set_control_thresholds(config, control, pair, advanced) {
                applied += 1;
            } else {
                warn!(%control, advanced, "Control has nothing to edit in this mode");
            }
        });
        applied
    }

    pub fn control_visible(&self, control: Control) -> bool {
        self.ownership.control_visible(&self.first_active_pad_config(), control, self.advanced_mode())
    }

    /// Make every sensor a control owns agree with the control's first sensor
    pub fn sync_owned_thresholds(&self) -> usize {
        let advanced = self.advanced_mode();
        self.edit_active_pads(None, |config| {
            self.ownership.sync_owned_thresholds(config, advanced);
        })
    }

    /// Leaving advanced mode folds each mirrored group back onto its
    /// representative panel's values.
    pub fn set_advanced_mode(&mut self, enabled: bool) -> Result<()> {
        let leaving = self.preferences.advanced_mode && !enabled;
        self.preferences.advanced_mode = enabled;
        self.save_preferences()?;
        info!(enabled, "Advanced mode");

        if leaving {
            self.edit_active_pads(None, thresholds::sync_unified_thresholds);
        } else {
            self.notifier.fire_configuration_changed(None);
        }
        Ok(())
    }

    /// Panels have been set apart from their mirrors, so simple mode can't
    /// represent the config
    pub fn advanced_view_required(&self) -> bool {
        presets::advanced_view_required(&self.first_active_pad_config())
    }

    pub fn add_custom_sensor(&mut self, sensor: PanelAndSensor) -> Result<bool> {
        let mut ownership = self.ownership.clone();
        let added = ownership.custom_sensors.add(sensor);
        if added {
            self.set_ownership(ownership)?;
        }
        Ok(added)
    }

    pub fn remove_custom_sensor(&mut self, sensor: PanelAndSensor) -> Result<bool> {
        let mut ownership = self.ownership.clone();
        let removed = ownership.custom_sensors.remove(sensor);
        if removed {
            self.set_ownership(ownership)?;
        }
        Ok(removed)
    }

    /// Returns whether the sensor is now in the list
    pub fn toggle_custom_sensor(&mut self, sensor: PanelAndSensor) -> Result<bool> {
        let mut ownership = self.ownership.clone();
        let now_present = ownership.custom_sensors.toggle(sensor);
        self.set_ownership(ownership)?;
        Ok(now_present)
    }

    pub fn set_use_inner_sensor_thresholds(&mut self, enabled: bool) -> Result<()> {
        let mut ownership = self.ownership.clone();
        ownership.use_inner_sensor_thresholds = enabled;
        self.set_ownership(ownership)
    }

    pub fn set_use_outer_sensor_thresholds(&mut self, enabled: bool) -> Result<()> {
        let mut ownership = self.ownership.clone();
        ownership.use_outer_sensor_thresholds = enabled;
        self.set_ownership(ownership)
    }

    pub fn select_pad(&mut self, selection: SelectedPad) -> Result<()> {
        self.preferences.selected_pad = selection;
        self.save_preferences()?;
        info!(%selection, "Selected pad");
        self.notifier.fire_configuration_changed(None);
        Ok(())
    }

    pub fn pads_need_sync(&self) -> bool {
        active_pad::pads_need_sync(&self.state(), self.preferences.selected_pad)
    }

    /// Copy pad 1's thresholds and enabled panels onto pad 2. Returns false
    /// when either pad is missing.
    pub fn sync_p2_from_p1(&self) -> bool {
        let state = self.state();
        if !state[0].connected || !state[1].connected {
            warn!("Both pads must be connected to sync them");
            return false;
        }
        let mut p2 = state[1].config;
        active_pad::sync_p2_from_p1(&state[0].config, &mut p2);
        info!("Syncing pad 2 from pad 1");
        driver::write_config(self.driver().as_ref(), 1, &p2);
        self.notifier.fire_configuration_changed(None);
        true
    }

    pub fn factory_reset(&self) {
        for (pad, _) in self.active_pads() {
            info!(pad, "Factory reset");
            self.driver().factory_reset(pad);
        }
    }

    pub fn force_recalibration(&self) {
        for pad in 0..pads::COUNT {
            self.driver().force_recalibration(pad);
        }
    }

    pub fn set_sensor_test_mode(&self, mode: SensorTestMode) {
        for pad in 0..pads::COUNT {
            self.driver().set_sensor_test_mode(pad, mode);
        }
    }

    pub fn set_panel_color(&self, panel: usize, color: Rgb) -> usize {
        self.edit_active_pads(None, |config| config.set_step_color(panel, color))
    }

    pub fn set_enabled_panels(&self, enabled: [bool; panels::COUNT]) -> usize {
        self.edit_active_pads(None, |config| {
            config.set_enabled_panels(enabled);
            config.refresh_auto_light_panel_mask(true);
        })
    }

    pub fn set_light_all_panels_mode(&self, enable: bool) -> usize {
        self.edit_active_pads(None, |config| config.set_light_all_panels_mode(enable))
    }

    /// Settings of the first active pad plus the local preferences
    pub fn export_settings(&self) -> String {
        settings_file::export_settings(&self.first_active_pad_config(), self.advanced_mode(), &self.ownership)
    }

    /// Apply a settings file to every active pad. A malformed file changes
    /// nothing.
    pub fn import_settings(&mut self, text: &str) -> Result<usize> {
        let doc = match SettingsDocument::parse(text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Settings import rejected");
                return Err(e).context("Failed to import settings");
            }
        };

        let mut advanced = self.preferences.advanced_mode;
        let mut ownership = self.ownership.clone();
        doc.apply_to_local(&mut advanced, &mut ownership);
        self.preferences.advanced_mode = advanced;
        self.ownership = ownership;
        self.preferences.set_ownership(&self.ownership);
        self.save_preferences()?;

        let written = self.edit_active_pads(None, |config| doc.apply_to_config(config));
        info!(pads = written, "Imported settings");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::wire::FLAG_FSR;
    use crate::driver::MemoryDriver;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn load_cell() -> PackedConfig {
        PackedConfig { master_version: 3, config_version: 5, enabled_sensors: [0xFF, 0xFF, 0xFF, 0xFF, 0xF0], ..Default::default() }
    }

    fn fsr() -> PackedConfig {
        PackedConfig { master_version: 5, flags: FLAG_FSR, ..load_cell() }
    }

    fn setup(pads: &[(usize, PackedConfig)]) -> (Arc<MemoryDriver>, AppContext) {
        let driver = Arc::new(MemoryDriver::new());
        for (pad, config) in pads {
            driver.connect_config(*pad, 5, config);
        }
        let ctx = AppContext::new(driver.clone(), Preferences::default(), None).unwrap();
        (driver, ctx)
    }

    fn stored(driver: &MemoryDriver, pad: usize) -> PackedConfig {
        driver.raw_config(pad).unwrap().decode()
    }

    struct BadSizeDriver;

    impl Driver for BadSizeDriver {
        fn info(&self, _pad: usize) -> crate::driver::PadInfo {
            Default::default()
        }
        fn input_state(&self, _pad: usize) -> u16 {
            0
        }
        fn config(&self, _pad: usize) -> Option<crate::driver::RawConfig> {
            None
        }
        fn set_config(&self, _pad: usize, _bytes: &[u8; crate::constants::wire::CONFIG_SIZE]) {}
        fn test_data(&self, _pad: usize) -> Option<crate::driver::TestModeData> {
            None
        }
        fn set_sensor_test_mode(&self, _pad: usize, _mode: SensorTestMode) {}
        fn factory_reset(&self, _pad: usize) {}
        fn force_recalibration(&self, _pad: usize) {}
        fn config_size(&self) -> usize {
            249
        }
        fn start_notifications(&self, _callback: crate::driver::UpdateCallback) {}
    }

    #[test]
    fn size_mismatch_is_fatal() {
        assert!(AppContext::new(Arc::new(BadSizeDriver), Preferences::default(), None).is_err());
    }

    #[test]
    fn no_pads_is_not_an_error() {
        let (_driver, ctx) = setup(&[]);
        assert!(ctx.active_pads().is_empty());
        assert_eq!(ctx.first_active_pad_config(), PackedConfig::default());
        assert_eq!(ctx.apply_preset(Preset::High), 0);
    }

    #[test]
    fn preset_writes_every_active_pad_and_fires_once() {
        let (driver, ctx) = setup(&[(0, load_cell()), (1, load_cell())]);
        let fired = Rc::new(RefCell::new(0));
        let counter = fired.clone();
        let _sub = ctx.subscribe(
            move |args| {
                if args.configuration_changed {
                    *counter.borrow_mut() += 1;
                }
            },
            false,
            false,
        );

        assert_eq!(ctx.apply_preset(Preset::Low), 2);
        assert_eq!(*fired.borrow(), 1);
        assert_eq!(Preset::classify(&stored(&driver, 0)), Some(Preset::Low));
        assert_eq!(Preset::classify(&stored(&driver, 1)), Some(Preset::Low));
        assert_eq!(ctx.current_preset(), Some(Preset::Low));
    }

    #[test]
    fn selection_limits_edits() {
        let (driver, mut ctx) = setup(&[(0, load_cell()), (1, load_cell())]);
        ctx.select_pad(SelectedPad::P2).unwrap();
        ctx.apply_preset(Preset::High);
        assert_eq!(Preset::classify(&stored(&driver, 0)), None);
        assert_eq!(Preset::classify(&stored(&driver, 1)), Some(Preset::High));
    }

    #[test]
    fn simple_mode_cardinal_edit_mirrors() {
        let (driver, mut ctx) = setup(&[(0, load_cell())]);
        ctx.set_advanced_mode(false).unwrap();
        ctx.set_control_thresholds(Control::Cardinal, ThresholdPair::new(40, 50), None);
        let c = stored(&driver, 0);
        for panel in [3, 5, 7] {
            assert_eq!(c.panel_thresholds(panel), ThresholdPair::new(40, 50));
        }
        assert_eq!(ctx.control_thresholds(Control::Cardinal), Some(ThresholdPair::new(40, 50)));
    }

    #[test]
    fn hidden_control_edit_is_refused() {
        let (driver, mut ctx) = setup(&[(0, load_cell())]);
        ctx.set_advanced_mode(false).unwrap();
        let before = stored(&driver, 0);
        assert_eq!(ctx.set_control_thresholds(Control::Left, ThresholdPair::new(1, 2), None), 0);
        assert_eq!(stored(&driver, 0), before);
        assert_eq!(ctx.control_thresholds(Control::Left), None);

        ctx.set_advanced_mode(true).unwrap();
        assert_eq!(ctx.set_control_thresholds(Control::Corner, ThresholdPair::new(1, 2), None), 0);
        assert_eq!(ctx.set_control_thresholds(Control::Left, ThresholdPair::new(1, 2), None), 1);
        assert_eq!(stored(&driver, 0).panel_thresholds(3), ThresholdPair::new(1, 2));
    }

    #[test]
    fn leaving_advanced_mode_mirrors() {
        let mut c = load_cell();
        c.set_panel_thresholds(7, ThresholdPair::new(11, 22));
        let (driver, mut ctx) = setup(&[(0, c)]);
        assert!(ctx.advanced_view_required());
        ctx.set_advanced_mode(false).unwrap();
        assert_eq!(stored(&driver, 0).panel_thresholds(3), ThresholdPair::new(11, 22));
        assert!(!ctx.advanced_view_required());
    }

    #[test]
    fn custom_sensor_takes_over_and_resyncs() {
        let mut c = fsr();
        c.set_sensor_thresholds(PanelAndSensor::new(1, 0), ThresholdPair::new(100, 110));
        let (driver, mut ctx) = setup(&[(0, c)]);
        let sensor = PanelAndSensor::new(1, 3);

        assert!(ctx.add_custom_sensor(sensor).unwrap());
        assert!(!ctx.add_custom_sensor(sensor).unwrap());
        assert!(ctx.ownership().custom_sensors.contains(sensor));
        assert!(!ctx.ownership().owned(Control::Up, true, false).contains(&sensor));

        ctx.set_control_thresholds(Control::Up, ThresholdPair::new(150, 160), None);
        let c = stored(&driver, 0);
        assert_eq!(c.sensor_thresholds(PanelAndSensor::new(1, 0)), ThresholdPair::new(150, 160));
        assert_ne!(c.sensor_thresholds(sensor), ThresholdPair::new(150, 160));

        assert!(!ctx.toggle_custom_sensor(sensor).unwrap());
        assert!(ctx.ownership().custom_sensors.is_empty());
        // back under "up", so the resync pulls it in line
        assert_eq!(stored(&driver, 0).sensor_thresholds(sensor), ThresholdPair::new(150, 160));
    }

    #[test]
    fn inner_sensor_flag_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = AppContext::new(driver, Preferences::default(), Some(path.clone())).unwrap();
        ctx.set_use_inner_sensor_thresholds(true).unwrap();
        ctx.select_pad(SelectedPad::P1).unwrap();

        let loaded = Preferences::load_from(&path);
        assert!(loaded.use_inner_sensor_thresholds);
        assert_eq!(loaded.selected_pad, SelectedPad::P1);
    }

    #[test]
    fn divergent_pads_need_sync_until_synced() {
        let mut other = load_cell();
        other.set_panel_thresholds(4, ThresholdPair::new(1, 2));
        other.set_step_color(0, Rgb::new(255, 0, 0));
        let (driver, ctx) = setup(&[(0, load_cell()), (1, other)]);
        assert!(ctx.pads_need_sync());

        assert!(ctx.sync_p2_from_p1());
        assert!(!ctx.pads_need_sync());
        // colors are left alone
        assert_eq!(stored(&driver, 1).step_color(0), Rgb::new(255, 0, 0));
    }

    #[test]
    fn sync_needs_both_pads() {
        let (_driver, ctx) = setup(&[(0, load_cell())]);
        assert!(!ctx.sync_p2_from_p1());
        assert!(!ctx.pads_need_sync());
    }

    #[test]
    fn enabled_panels_refresh_light_mask() {
        let (driver, ctx) = setup(&[(0, load_cell())]);
        let mut enabled = [false; 9];
        enabled[1] = true;
        enabled[4] = true;
        ctx.set_enabled_panels(enabled);
        assert_eq!(stored(&driver, 0).auto_light_panel_mask, (1 << 1) | (1 << 4));

        ctx.set_light_all_panels_mode(true);
        ctx.set_enabled_panels([true; 9]);
        assert!(stored(&driver, 0).light_all_panels_mode());
    }

    #[test]
    fn import_round_trip_through_context() {
        let (driver, mut ctx) = setup(&[(0, load_cell())]);
        ctx.apply_preset(Preset::Normal);
        ctx.set_panel_color(2, Rgb::new(0, 0x66, 0xCC));
        let exported = ctx.export_settings();

        ctx.apply_preset(Preset::High);
        assert_eq!(ctx.import_settings(&exported).unwrap(), 1);
        let c = stored(&driver, 0);
        assert_eq!(Preset::classify(&c), Some(Preset::Normal));
        assert_eq!(c.step_color(2), Rgb::new(0, 0x66, 0xCC));
    }

    #[test]
    fn bad_import_changes_nothing() {
        let (driver, mut ctx) = setup(&[(0, load_cell())]);
        ctx.apply_preset(Preset::Low);
        let before = driver.raw_config(0);
        assert!(ctx.import_settings("{\"advancedMode\": false,").is_err());
        assert_eq!(driver.raw_config(0), before);
        assert!(ctx.advanced_mode());
    }

    #[test]
    fn factory_reset_notifies_after_pump() {
        let (driver, ctx) = setup(&[(0, load_cell())]);
        ctx.apply_preset(Preset::Low);
        ctx.pump();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let _sub = ctx.subscribe(move |args| log.borrow_mut().push(args.configuration_changed), false, false);

        ctx.factory_reset();
        ctx.pump();
        assert_eq!(*seen.borrow(), vec![false, true]);
        assert_eq!(Preset::classify(&stored(&driver, 0)), None);
    }

    #[test]
    fn recalibration_and_test_mode_reach_both_pads() {
        let (driver, ctx) = setup(&[(0, load_cell()), (1, load_cell())]);
        ctx.force_recalibration();
        ctx.set_sensor_test_mode(SensorTestMode::CalibratedValues);
        for pad in 0..2 {
            assert_eq!(driver.recalibrations(pad), 1);
            assert_eq!(driver.sensor_test_mode(pad), Some(SensorTestMode::CalibratedValues));
        }
    }
}
