//! Error types for value parsing in skylog-types.

use thiserror::Error;

/// Errors that can occur when parsing skylog values from user input.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The entity key is empty or cannot be used as a storage name.
    #[error("Invalid entity key '{key}': {reason}")]
    InvalidEntity {
        /// The key as supplied by the caller.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// The temperature unit name is not recognised.
    #[error("Invalid temperature unit '{0}': expected kelvin, celsius or fahrenheit")]
    InvalidUnit(String),
}

/// Result type alias using skylog-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
