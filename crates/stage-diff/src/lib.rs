//! Content diffing and synchronization for stage-sync
//!
//! [`ContentDiffEngine`] compares a local deploy root with a remote stage
//! location, using [`stage_fs::ContentHashMatcher`] to recognize identical
//! content behind plain or multi-part MD5 hashes, and applies the resulting
//! [`DiffResult`] through a caller-provided [`RemoteStage`].

pub mod deploy;
pub mod diff;
pub mod engine;
pub mod error;
pub mod location;
pub mod logging;
pub mod remote;
pub mod role;

pub use deploy::{DeployRequest, deploy};
pub use diff::{DiffResult, preserve_from_diff};
pub use engine::{ContentDiffEngine, SyncReport};
pub use error::{Error, Result, SyncOperation};
pub use location::{StageKind, StageLocation};
pub use remote::{RemoteEntry, RemoteError, RemoteStage};
pub use role::RoleGuard;
