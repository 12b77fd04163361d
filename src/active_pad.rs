//! Which connected pads an edit applies to

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::PackedConfig;
use crate::constants::pads;
use crate::device::PadSnapshot;

/// The user's pad choice. Only consulted while both pads are connected and
/// kept unchanged when one disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectedPad {
    P1,
    P2,
    #[default]
    Both,
}

impl fmt::Display for SelectedPad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectedPad::P1 => "p1",
            SelectedPad::P2 => "p2",
            SelectedPad::Both => "both",
        })
    }
}

impl FromStr for SelectedPad {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p1" | "1" => Ok(SelectedPad::P1),
            "p2" | "2" => Ok(SelectedPad::P2),
            "both" => Ok(SelectedPad::Both),
            other => Err(format!("unknown pad selection '{other}' (expected p1, p2 or both)")),
        }
    }
}

/// Connected pads being edited, pad 0 first
pub fn active_pads(state: &[PadSnapshot; pads::COUNT], selection: SelectedPad) -> Vec<(usize, PackedConfig)> {
    let mut live = [state[0].connected, state[1].connected];
    if live[0] && live[1] {
        match selection {
            SelectedPad::P1 => live[1] = false,
            SelectedPad::P2 => live[0] = false,
            SelectedPad::Both => {}
        }
    }
    (0..pads::COUNT)
        .filter(|&pad| live[pad])
        .map(|pad| (pad, state[pad].config))
        .collect()
}

/// Config to show when several pads are edited together. A zeroed config
/// when nothing is connected.
pub fn first_active_pad_config(state: &[PadSnapshot; pads::COUNT], selection: SelectedPad) -> PackedConfig {
    active_pads(state, selection)
        .into_iter()
        .next()
        .map(|(_, config)| config)
        .unwrap_or_default()
}

/// Two pads can be edited together without clobbering either: same
/// thresholds and same enabled panels. Colors don't matter.
pub fn configurations_synced(a: &PackedConfig, b: &PackedConfig) -> bool {
    a.thresholds_equal(b) && a.enabled_sensors == b.enabled_sensors
}

/// Both pads are connected and selected together but configured differently
pub fn pads_need_sync(state: &[PadSnapshot; pads::COUNT], selection: SelectedPad) -> bool {
    selection == SelectedPad::Both
        && state[0].connected
        && state[1].connected
        && !configurations_synced(&state[0].config, &state[1].config)
}

/// Make `p2` match `p1`'s thresholds and enabled panels, keeping its colors
pub fn sync_p2_from_p1(p1: &PackedConfig, p2: &mut PackedConfig) {
    p2.enabled_sensors = p1.enabled_sensors;
    p2.copy_thresholds_from(p1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::types::ThresholdPair;

    fn state(c0: bool, c1: bool) -> [PadSnapshot; 2] {
        let mut s: [PadSnapshot; 2] = Default::default();
        s[0].connected = c0;
        s[1].connected = c1;
        s[0].config.panel_rotation = 10;
        s[1].config.panel_rotation = 11;
        s
    }

    fn pads_of(list: &[(usize, PackedConfig)]) -> Vec<usize> {
        list.iter().map(|(p, _)| *p).collect()
    }

    #[test]
    fn single_pad_ignores_selection() {
        for sel in [SelectedPad::P1, SelectedPad::P2, SelectedPad::Both] {
            assert_eq!(pads_of(&active_pads(&state(true, false), sel)), [0]);
            assert_eq!(pads_of(&active_pads(&state(false, true), sel)), [1]);
            assert!(active_pads(&state(false, false), sel).is_empty());
        }
    }

    #[test]
    fn both_connected_follow_selection() {
        let s = state(true, true);
        assert_eq!(pads_of(&active_pads(&s, SelectedPad::P1)), [0]);
        assert_eq!(pads_of(&active_pads(&s, SelectedPad::P2)), [1]);
        assert_eq!(pads_of(&active_pads(&s, SelectedPad::Both)), [0, 1]);
    }

    #[test]
    fn first_active_config_falls_back_to_zero() {
        assert_eq!(first_active_pad_config(&state(false, true), SelectedPad::Both).panel_rotation, 11);
        assert_eq!(first_active_pad_config(&state(false, false), SelectedPad::Both), PackedConfig::default());
    }

    #[test]
    fn diverged_thresholds_need_sync() {
        let mut s = state(true, true);
        s[1].config.set_panel_thresholds(4, ThresholdPair::new(5, 6));
        assert!(!configurations_synced(&s[0].config, &s[1].config));
        assert!(pads_need_sync(&s, SelectedPad::Both));
        assert!(!pads_need_sync(&s, SelectedPad::P1));
        s[1].connected = false;
        assert!(!pads_need_sync(&s, SelectedPad::Both));
    }

    #[test]
    fn colors_do_not_count_and_are_not_copied() {
        let mut p1 = PackedConfig::default();
        let mut p2 = PackedConfig::default();
        p1.set_step_color(0, Rgb::new(255, 0, 0));
        p2.set_step_color(0, Rgb::new(0, 0, 255));
        assert!(configurations_synced(&p1, &p2));

        p1.set_enabled_panels([true; 9]);
        p1.set_panel_thresholds(1, ThresholdPair::new(20, 30));
        sync_p2_from_p1(&p1, &mut p2);
        assert!(configurations_synced(&p1, &p2));
        assert_eq!(p2.step_color(0), Rgb::new(0, 0, 255));
    }

    #[test]
    fn selection_parses() {
        assert_eq!("P2".parse::<SelectedPad>(), Ok(SelectedPad::P2));
        assert!("three".parse::<SelectedPad>().is_err());
        assert_eq!(SelectedPad::Both.to_string(), "both");
    }
}
