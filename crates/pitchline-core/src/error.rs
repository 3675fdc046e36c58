//! Error types for pitchline-core.
//!
//! One taxonomy covers the whole pipeline. Errors are `Clone` so the
//! coordinator can hand them to a listener on another thread.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for pipeline operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The user declined audio capture access.
    #[error("Record permission denied")]
    PermissionDenied,

    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Cannot read audio file {}: {reason}", path.display())]
    FileUnreadable { path: PathBuf, reason: String },

    #[error("No pitch detected")]
    NoPitchDetected,

    #[error("Insufficient signal: need {required} samples, got {actual}")]
    InsufficientSignal { required: usize, actual: usize },

    #[error("Transform failed: {0}")]
    TransformFailure(String),

    #[error("Invalid frequency: {0} Hz")]
    InvalidFrequency(f64),

    #[error("Processing stage panicked: {0}")]
    StagePanicked(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A pipeline thread or pool could not be created.
    #[error("Thread spawn failed: {0}")]
    ThreadSpawn(String),
}

impl Error {
    pub fn file_unreadable(path: &Path, reason: impl ToString) -> Self {
        Self::FileUnreadable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Per-buffer failures. The pipeline keeps running after these.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoPitchDetected
                | Self::InsufficientSignal { .. }
                | Self::TransformFailure(_)
                | Self::InvalidFrequency(_)
                | Self::StagePanicked(_)
        )
    }

    /// Acquisition failures. These stop the pipeline and are reported once.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::DeviceUnavailable(_) | Self::FileUnreadable { .. }
        )
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
