//! Error types for ruuvibridge-core.
//!
//! Steady-state failures in this system are per-item and recoverable: a
//! malformed advertisement, a broker that dropped its connection, a log file
//! that cannot be appended to. The pipeline logs them and moves on (see the
//! pipeline module); these types exist so the places that *can* make that
//! decision receive something structured to decide on.

use thiserror::Error;

/// Errors that can occur in the gateway core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter available on this host.
    #[error("no Bluetooth adapter available")]
    NoAdapter,

    /// Failed to decode an advertisement payload.
    #[error("advertisement decode failed: {0}")]
    Parse(#[from] ruuvibridge_types::ParseError),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A publish reached none of the configured broker endpoints.
    #[error("publish to '{topic}' failed on all {endpoints} endpoint(s)")]
    PublishFailed {
        /// Topic the publish was addressed to.
        topic: String,
        /// Number of endpoints that were attempted.
        endpoints: usize,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a publish-failed error for a topic.
    pub fn publish_failed(topic: impl Into<String>, endpoints: usize) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            endpoints,
        }
    }
}

/// Result type alias using ruuvibridge-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::publish_failed("home/sauna", 2);
        assert!(err.to_string().contains("home/sauna"));
        assert!(err.to_string().contains('2'));

        let err = Error::NoAdapter;
        assert_eq!(err.to_string(), "no Bluetooth adapter available");
    }

    #[test]
    fn test_parse_error_conversion() {
        let parse = ruuvibridge_types::ParseError::UnsupportedDataFormat(3);
        let err: Error = parse.into();
        assert!(matches!(err, Error::Parse(_)));
    }
}
