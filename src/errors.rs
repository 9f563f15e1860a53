// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture controller
//!
//! The variants follow the failure classes the controller distinguishes:
//! permission and device failures end the session, capture and write
//! failures are reported and the user may retry, cleanup failures are only
//! logged.

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Camera or library access was denied by the user or by policy
    PermissionDenied(String),
    /// No capture device matched the request
    NoDeviceAvailable(String),
    /// An input or output could not be attached to the capture session
    Attach(String),
    /// Photo capture or recording failed
    Capture(String),
    /// Writing an asset to the library failed
    Write(String),
    /// Temporary file removal failed
    Cleanup(String),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

impl AppError {
    /// Whether this error ends the capture session (no retry possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppError::PermissionDenied(_) | AppError::NoDeviceAvailable(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            AppError::NoDeviceAvailable(msg) => write!(f, "No device available: {}", msg),
            AppError::Attach(msg) => write!(f, "Failed to attach to session: {}", msg),
            AppError::Capture(msg) => write!(f, "Capture error: {}", msg),
            AppError::Write(msg) => write!(f, "Library write error: {}", msg),
            AppError::Cleanup(msg) => write!(f, "Cleanup error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceNotFound(msg) => AppError::NoDeviceAvailable(msg),
            BackendError::AttachFailed(msg) => AppError::Attach(msg),
            other => AppError::Capture(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_are_permission_and_device() {
        assert!(AppError::PermissionDenied("camera".into()).is_terminal());
        assert!(AppError::NoDeviceAvailable("back camera".into()).is_terminal());
        assert!(!AppError::Capture("sensor".into()).is_terminal());
        assert!(!AppError::Write("disk full".into()).is_terminal());
        assert!(!AppError::Cleanup("busy".into()).is_terminal());
    }

    #[test]
    fn backend_errors_map_to_taxonomy() {
        let err: AppError = BackendError::DeviceNotFound("no camera".into()).into();
        assert_eq!(err, AppError::NoDeviceAvailable("no camera".into()));

        let err: AppError = BackendError::AttachFailed("busy".into()).into();
        assert_eq!(err, AppError::Attach("busy".into()));

        let err: AppError = BackendError::NotRunning.into();
        assert!(matches!(err, AppError::Capture(_)));
    }
}
