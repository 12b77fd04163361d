//! Local preferences
//!
//! Settings that belong to this machine rather than to a pad: view mode,
//! sensor group switches, the custom sensor list and the pad selection.

pub mod preferences;

pub use preferences::Preferences;
