//! Application-wide constants
//!
//! Wire sizes, panel/sensor addressing and file locations used throughout
//! the crate, providing a single source of truth for constant values.

/// Binary configuration contract with the pad firmware
pub mod wire {
    /// Encoded size of one pad's configuration. Identical for every schema revision.
    pub const CONFIG_SIZE: usize = 250;

    /// Schema version the encoder stamps on every write
    pub const CURRENT_CONFIG_VERSION: u8 = 5;

    /// Version byte of a record that was never written (erased flash)
    pub const VERSION_UNSET: u8 = 0xFF;

    /// First schema version storing thresholds for every panel
    pub const PER_PANEL_THRESHOLDS_VERSION: u8 = 2;

    /// First schema version storing the delayed debounce time
    pub const DEBOUNCE_DELAY_VERSION: u8 = 3;

    /// First master firmware able to report pressure-sensor hardware
    pub const FSR_MIN_MASTER_VERSION: u8 = 4;

    /// First master firmware speaking the current layout
    pub const CURRENT_LAYOUT_MIN_FIRMWARE: u16 = 5;

    /// `flags` bit: pad uses pressure sensors (four threshold pairs per panel)
    pub const FLAG_FSR: u8 = 0x02;

    /// Bytes in the packed enabled-sensor mask
    pub const ENABLED_SENSORS_SIZE: usize = 5;

    /// Auto-light mask value meaning "light every panel"
    pub const LIGHT_ALL_PANELS: u16 = 0xFFFF;
}

/// Panel addressing on the 3x3 grid
pub mod panels {
    pub const COUNT: usize = 9;

    pub const UP_LEFT: usize = 0;
    pub const UP: usize = 1;
    pub const UP_RIGHT: usize = 2;
    pub const LEFT: usize = 3;
    pub const CENTER: usize = 4;
    pub const RIGHT: usize = 5;
    pub const DOWN_LEFT: usize = 6;
    pub const DOWN: usize = 7;
    pub const DOWN_RIGHT: usize = 8;

    /// Edge panel holding the simple-mode "cardinal" value
    pub const CARDINAL_SOURCE: usize = DOWN;

    /// Panels that copy the cardinal value in simple mode
    pub const CARDINAL_MIRRORS: [usize; 2] = [LEFT, RIGHT];

    /// Corner panel holding the simple-mode "corner" value
    pub const CORNER_SOURCE: usize = UP_RIGHT;

    /// Panels that copy the corner value in simple mode
    pub const CORNER_MIRRORS: [usize; 3] = [UP_LEFT, DOWN_LEFT, DOWN_RIGHT];
}

/// Sensor addressing within one panel
pub mod sensors {
    pub const PER_PANEL: usize = 4;

    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const UP: usize = 2;
    pub const DOWN: usize = 3;
}

/// Controller units
pub mod pads {
    pub const COUNT: usize = 2;
}

/// Step light color handling
pub mod lights {
    /// Hardware lights only use 0-170 of the byte range
    pub const SCALE_FACTOR: f32 = 0.666666;

    /// Unscaled channels at or above this are written out as full brightness
    pub const SNAP_TO_FULL: u8 = 0xFD;

    /// Bytes per RGB color
    pub const CHANNELS: usize = 3;
}

/// Preferences location
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "smx-config";

    /// Preferences filename
    pub const FILENAME: &str = "preferences.json";

    /// Extension of exported settings files
    pub const SETTINGS_EXTENSION: &str = "smxcfg";
}

/// JSON serializer layout
pub mod json {
    /// Spaces per nesting level
    pub const INDENT: usize = 4;

    /// Nesting depth the parser accepts before bailing out
    pub const MAX_DEPTH: usize = 128;
}
