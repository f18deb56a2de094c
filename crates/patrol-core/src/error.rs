//! Error types for patrol-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid geofence: {0}")]
    InvalidGeofence(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
