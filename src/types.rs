//! Shared addressing and value types

use std::fmt;

use crate::constants::{panels, sensors};

/// One physical transducer: a panel (0-8) and a sensor beneath it (0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelAndSensor {
    pub panel: usize,
    pub sensor: usize,
}

impl PanelAndSensor {
    pub const fn new(panel: usize, sensor: usize) -> Self {
        Self { panel, sensor }
    }

    /// Validating constructor for values coming from files
    pub fn checked(panel: i64, sensor: i64) -> Option<Self> {
        let panel = usize::try_from(panel).ok()?;
        let sensor = usize::try_from(sensor).ok()?;
        (panel < panels::COUNT && sensor < sensors::PER_PANEL).then_some(Self { panel, sensor })
    }

    /// All four sensors of one panel
    pub fn all_of(panel: usize) -> impl Iterator<Item = Self> {
        (0..sensors::PER_PANEL).map(move |sensor| Self { panel, sensor })
    }
}

impl fmt::Display for PanelAndSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.panel, self.sensor)
    }
}

/// Activation (`high`) and release (`low`) levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThresholdPair {
    pub low: u8,
    pub high: u8,
}

impl ThresholdPair {
    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }
}

impl fmt::Display for ThresholdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.low, self.high)
    }
}
