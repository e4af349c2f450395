//! Remote stage abstraction
//!
//! The engine never talks to a stage directly. Callers provide a
//! [`RemoteStage`] implementation backed by whatever transport they use
//! (SQL `LIST`/`PUT`/`REMOVE`, REST, a test double).

use crate::location::StageLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One record of a recursive stage listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Name as reported by the stage, possibly prefixed with the stage name
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Provider checksum, if the provider exposes one
    pub hash: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// A remote call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Remote operation failed: {message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Listing and mutation capabilities of a remote stage.
///
/// All calls are blocking. Addresses passed to [`delete`](Self::delete) and
/// [`upload`](Self::upload) are fully qualified (for example
/// `@db.schema.stage/app/main.py`).
pub trait RemoteStage {
    /// Recursively list everything under `location`
    fn list(&self, location: &StageLocation) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Remove the file at `address`
    fn delete(&mut self, address: &str, role: &str) -> Result<(), RemoteError>;

    /// Upload `local_path` into the stage directory `destination_directory`,
    /// keeping its file name
    fn upload(
        &mut self,
        local_path: &Path,
        destination_directory: &str,
        role: &str,
    ) -> Result<(), RemoteError>;

    /// The role the session currently acts as
    fn current_role(&self) -> Result<String, RemoteError>;

    /// Switch the session to `role`
    fn use_role(&mut self, role: &str) -> Result<(), RemoteError>;
}
