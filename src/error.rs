use thiserror::Error;

use crate::codec::WireLayout;

/// Integrity failures of the binary configuration codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encoder wrote {written} bytes, wire size is {expected}")]
    EncodedSize { written: usize, expected: usize },

    #[error("{layout} decoder consumed {consumed} bytes, wire size is {expected}")]
    DecodedSize {
        layout: WireLayout,
        consumed: usize,
        expected: usize,
    },

    #[error("zero configuration changed across an encode/decode round trip")]
    RoundTrip,

    #[error("driver reports a {driver}-byte configuration, codec uses {expected}")]
    DriverSize { driver: usize, expected: usize },

    #[error("expected {expected} bytes of configuration, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Malformed JSON text, with the position where parsing stopped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct JsonError {
    pub message: String,
    /// Byte offset into the input
    pub offset: usize,
    /// 1-based
    pub line: usize,
    /// 1-based, counted in characters
    pub column: usize,
}

/// Settings file import failures. Nothing is applied when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("malformed settings file: {0}")]
    Json(#[from] JsonError),

    #[error("settings file root must be an object")]
    NotAnObject,
}

/// A threshold control name that is not one of the fourteen known controls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown threshold control '{0}'")]
pub struct UnknownControl(pub String);

/// A preset name other than low, normal or high
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown preset '{0}'")]
pub struct UnknownPreset(pub String);
