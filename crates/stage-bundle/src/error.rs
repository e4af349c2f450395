//! Error types for stage-bundle

use std::path::PathBuf;

/// Result type for stage-bundle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while declaring or materializing artifact mappings.
///
/// Every validation error is raised by the `add_rule` call that caused it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source pattern matched nothing in the project directory
    #[error("No match was found for the specified source in the project directory: {pattern}")]
    SourceNotFound { pattern: String },

    /// A path is absolute or resolves outside of its root
    #[error("{path} is not contained in {root}")]
    NotInDeployRoot { path: PathBuf, root: PathBuf },

    /// Several sources would be written to the same output location
    #[error("Multiple files or directories were mapped to one output destination: {destination}")]
    TooManyFiles { destination: PathBuf },

    /// Inconsistent artifact declaration
    #[error("Artifact error: {message}")]
    Artifact { message: String },

    /// A project or deploy root is unusable
    #[error("Invalid root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// The source pattern could not be compiled as a glob
    #[error("Invalid source pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error from stage-fs
    #[error(transparent)]
    Fs(#[from] stage_fs::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walk(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        Self::Io {
            path,
            source: err.into(),
        }
    }
}
