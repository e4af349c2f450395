//! Filesystem layer for stage-sync
//!
//! Provides stage path normalization, MD5 and multi-part MD5 hashing, and
//! format-agnostic configuration loading.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod matcher;
pub mod path;

pub use checksum::{HashFormat, compute_bytes_md5sum, compute_md5sum};
pub use config::ConfigStore;
pub use error::{Error, Result};
pub use matcher::{ChunkSearch, ChunkStrategy, ContentHashMatcher, HashCandidate, file_matches_md5sum};
pub use path::StagePath;
