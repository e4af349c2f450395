//! Error types for stage-fs

use std::path::PathBuf;

/// Result type for stage-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stage-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote provider reported a checksum in a shape we do not recognize.
    #[error("Unknown hash format: {hash:?}")]
    UnknownHashFormat { hash: String },

    #[error("Not a regular file: {path}")]
    NotAFile { path: PathBuf },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
