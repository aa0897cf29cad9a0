//! Parse errors for beacon payload decoding.

use thiserror::Error;

/// Errors that can occur when decoding RuuviTag advertisement payloads.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Payload was shorter than the format requires.
    #[error("insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Minimum number of bytes the format requires.
        expected: usize,
        /// Number of bytes actually received.
        actual: usize,
    },

    /// The first payload byte named a data format this gateway does not decode.
    #[error("unsupported data format: 0x{0:02X}")]
    UnsupportedDataFormat(u8),

    /// A decoded value was outside its documented range.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
