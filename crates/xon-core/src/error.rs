//! Error handling for the xon workspace
//!
//! One error type shared by every library crate. Transient "no data yet"
//! conditions are not errors and never show up here; they are modelled as
//! `Ok(None)` or no-op pulls by the callers.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for xon operations
pub type XonResult<T> = Result<T, XonError>;

/// Error type for all xon operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum XonError {
    /// Invalid configuration value
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Named stream could not be resolved
    StreamNotFound {
        /// Name that was looked up
        name: String,
        /// Number of resolve attempts made
        attempts: usize,
    },

    /// Stream producer went away
    StreamClosed {
        /// Name of the closed stream
        name: String,
    },

    /// Data shape does not match what the component was built for
    ShapeMismatch {
        /// Where the mismatch was detected
        context: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Sensor, camera or actuator failure
    DeviceError {
        /// Device that failed
        device: String,
        /// Device-related error description
        reason: String,
    },

    /// Encoded camera frame could not be decoded
    FrameDecode {
        /// Decoder error description
        reason: String,
    },

    /// Model snapshot could not be saved or loaded
    Snapshot {
        /// Snapshot file
        path: PathBuf,
        /// Underlying I/O or serialization error
        reason: String,
    },

    /// Training requested with nothing collected
    EmptyDataset,
}

impl fmt::Display for XonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XonError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            XonError::StreamNotFound { name, attempts } => {
                write!(f, "Cannot find stream {} after {} attempts", name, attempts)
            }
            XonError::StreamClosed { name } => {
                write!(f, "Stream {} closed", name)
            }
            XonError::ShapeMismatch { context, expected, actual } => {
                write!(f, "Shape mismatch in {}: expected {}, got {}",
                       context, expected, actual)
            }
            XonError::DeviceError { device, reason } => {
                write!(f, "Device error on {}: {}", device, reason)
            }
            XonError::FrameDecode { reason } => {
                write!(f, "Frame decode error: {}", reason)
            }
            XonError::Snapshot { path, reason } => {
                write!(f, "Snapshot error at {}: {}", path.display(), reason)
            }
            XonError::EmptyDataset => {
                write!(f, "No calibration samples collected")
            }
        }
    }
}

impl std::error::Error for XonError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::XonError::InvalidConfig {
            reason: format!($($arg)+),
        }
    };
}
