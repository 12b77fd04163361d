//! Configuration core for StepManiaX dance pads
//!
//! Binary config codec, threshold ownership and presets, change
//! notification, settings files and local preferences. The driver that
//! talks to real hardware sits behind [`driver::Driver`].

#![forbid(unsafe_code)]

pub mod active_pad;
pub mod codec;
pub mod color;
pub mod config;
pub mod constants;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod json;
pub mod presets;
pub mod settings_file;
pub mod thresholds;
pub mod types;
