//! Step light colors: `#RRGGBB` strings and hardware brightness scaling

use std::fmt;

use crate::constants::lights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        match bytes {
            [r, g, b, ..] => Self::new(*r, *g, *b),
            _ => Self::default(),
        }
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Parse `#RRGGBB`. Anything else is rejected.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let rr = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let gg = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let bb = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(rr, gg, bb))
    }

    /// Parse `#RRGGBB`, substituting white for malformed input
    pub fn parse_or_white(s: &str) -> Self {
        Self::parse_hex(s).unwrap_or(Self::WHITE)
    }

    /// UI color (0-255) to the value written to the hardware
    pub fn scaled(self) -> Self {
        Self::new(scale_channel(self.r), scale_channel(self.g), scale_channel(self.b))
    }

    /// Hardware value back to the full-range UI color
    pub fn unscaled(self) -> Self {
        Self::new(unscale_channel(self.r), unscale_channel(self.g), unscale_channel(self.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

fn factor() -> f64 {
    f64::from(lights::SCALE_FACTOR)
}

pub fn scale_channel(c: u8) -> u8 {
    (f64::from(c) * factor()).round().clamp(0.0, 255.0) as u8
}

pub fn unscale_channel(c: u8) -> u8 {
    let result = (f64::from(c) / factor()).min(255.0).round() as u8;
    // quantized output; keep white clean
    if result >= lights::SNAP_TO_FULL { 0xFF } else { result }
}
