//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Errors decoding hex-encoded identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Input is not valid hex.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded value has the wrong byte length.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Errors reading or mutating global parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// No parameter is registered under this name.
    #[error("Unknown parameter: {0}")]
    UnknownParam(String),

    /// Value does not parse as the parameter's type.
    #[error("Invalid value for {name}: expected {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    /// Persisted parameter blob could not be decoded or encoded.
    #[error("Parameter serialization error: {0}")]
    Serialization(String),
}
