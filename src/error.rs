//! Unified error handling for the timeline engine.
//!
//! Every fallible operation in the crate returns [`Result`]. Input that is merely
//! too small to produce events (fewer than two points) is not an error; the
//! detectors return empty results instead.

use thiserror::Error;

/// Unified error type for timeline operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// Configuration is unusable (unknown algorithm, bad threshold, inconsistent bounds)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A point has a non-finite or out-of-range coordinate
    #[error("Point {index} has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinate {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    /// A point's timestamp is earlier than its predecessor's
    #[error("Point {index} is earlier than the point before it; input must be sorted by timestamp")]
    UnorderedInput { index: usize },

    /// Config or state could not be (de)serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl TimelineError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        TimelineError::Configuration {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for TimelineError {
    fn from(err: serde_json::Error) -> Self {
        TimelineError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimelineError::InvalidCoordinate {
            index: 7,
            latitude: 95.0,
            longitude: 0.0,
        };
        assert!(err.to_string().contains("Point 7"));

        let err = TimelineError::UnorderedInput { index: 3 };
        assert!(err.to_string().contains("sorted by timestamp"));
    }

    #[test]
    fn test_from_json_error() {
        let err: TimelineError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, TimelineError::Serialization { .. }));
    }
}
