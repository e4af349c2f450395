//! Error types for stage-diff

use crate::remote::RemoteError;
use stage_fs::StagePath;
use std::path::PathBuf;

/// Result type for stage-diff operations
pub type Result<T> = std::result::Result<T, Error>;

/// The remote mutation that failed during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Delete,
    Upload,
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

/// Errors that can occur while diffing or synchronizing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A delete or upload failed; the stage may be partially updated
    #[error("Synchronization failed to {operation} {path}: {source}")]
    Synchronization {
        operation: SyncOperation,
        path: StagePath,
        #[source]
        source: RemoteError,
    },

    /// Listing or role handling failed
    #[error("Stage {operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("Invalid stage location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    /// A path requested for deployment is not produced by any artifact rule
    #[error("No artifacts are mapped from {path}")]
    UnmappedPath { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Hashing or filesystem error from stage-fs
    #[error(transparent)]
    Fs(#[from] stage_fs::Error),

    /// Mapping error from stage-bundle
    #[error(transparent)]
    Bundle(#[from] stage_bundle::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
