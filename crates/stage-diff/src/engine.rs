//! ContentDiffEngine implementation
//!
//! The engine compares a local deploy root against one snapshot listing of a
//! stage location and applies the resulting [`DiffResult`] back to the stage.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use stage_fs::{ContentHashMatcher, StagePath};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::diff::DiffResult;
use crate::error::SyncOperation;
use crate::location::StageLocation;
use crate::remote::RemoteStage;
use crate::role::RoleGuard;
use crate::{Error, Result};

/// Report from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Role the mutations ran under
    pub role: String,
    /// Stage paths removed, in order
    pub deleted: Vec<StagePath>,
    /// Stage paths uploaded, in order
    pub uploaded: Vec<StagePath>,
}

impl SyncReport {
    /// True if the stage was not touched.
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty() && self.uploaded.is_empty()
    }
}

/// Diffs a local tree against a stage and synchronizes the two.
///
/// The engine owns its [`RemoteStage`] session for its lifetime; use
/// [`into_inner`](Self::into_inner) to take it back.
pub struct ContentDiffEngine<S: RemoteStage> {
    stage: S,
    matcher: ContentHashMatcher,
}

impl<S: RemoteStage> ContentDiffEngine<S> {
    pub fn new(stage: S) -> Self {
        Self {
            stage,
            matcher: ContentHashMatcher::default(),
        }
    }

    /// Use a non-default chunk-size search when comparing multi-part hashes.
    pub fn with_matcher(mut self, matcher: ContentHashMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn matcher(&self) -> &ContentHashMatcher {
        &self.matcher
    }

    pub fn into_inner(self) -> S {
        self.stage
    }

    /// Classify every file under `local_root` and every file listed under
    /// `location`.
    ///
    /// Paths present on both sides are compared by content hash; a remote
    /// entry without a hash is reported as different.
    ///
    /// # Errors
    ///
    /// Fails if the local tree cannot be walked, the listing fails, or a
    /// remote hash has an unrecognized format.
    pub fn compute(&self, local_root: &Path, location: &StageLocation) -> Result<DiffResult> {
        let local = local_files(local_root)?;

        let listing = self.stage.list(location).map_err(|source| Error::Remote {
            operation: "list",
            source,
        })?;
        let mut remote: BTreeMap<StagePath, Option<String>> = BTreeMap::new();
        for entry in listing {
            if entry.path.ends_with('/') {
                continue;
            }
            match location.to_stage_path(&entry.path) {
                Some(path) => {
                    remote.insert(path, entry.hash);
                }
                None => debug!(name = %entry.path, "Skipping listing entry outside location"),
            }
        }

        let mut diff = DiffResult::default();
        for path in local {
            match remote.remove(&path) {
                None => {
                    diff.only_local.insert(path);
                }
                Some(hash) => {
                    let local_file = local_root.join(path.to_native());
                    if self.matcher.file_matches_md5sum(&local_file, hash.as_deref())? {
                        diff.identical.insert(path);
                    } else {
                        diff.different.insert(path);
                    }
                }
            }
        }
        diff.only_on_stage.extend(remote.into_keys());

        info!(
            location = %location,
            only_local = diff.only_local.len(),
            only_on_stage = diff.only_on_stage.len(),
            different = diff.different.len(),
            identical = diff.identical.len(),
            "Computed stage diff"
        );
        Ok(diff)
    }

    /// Apply `diff` to `location` while acting as `role`.
    ///
    /// Deletes every `only_on_stage` path, then uploads every `only_local`
    /// and `different` path into the stage directory of its parent. The
    /// session's previous role is restored before returning, whether or not
    /// the sync succeeded. A diff without changes touches nothing.
    ///
    /// # Errors
    ///
    /// The first failed remote call aborts the sync with
    /// [`Error::Synchronization`]; earlier mutations are not rolled back.
    pub fn sync(
        &mut self,
        role: &str,
        diff: &DiffResult,
        local_root: &Path,
        location: &StageLocation,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            role: role.to_string(),
            ..SyncReport::default()
        };
        if !diff.has_changes() {
            debug!(location = %location, "Nothing to synchronize");
            return Ok(report);
        }

        let mut session = RoleGuard::acquire(&mut self.stage, role)?;

        for path in &diff.only_on_stage {
            let address = location.address(path);
            debug!(address = %address, "Deleting from stage");
            session
                .delete(&address, role)
                .map_err(|source| Error::Synchronization {
                    operation: SyncOperation::Delete,
                    path: path.clone(),
                    source,
                })?;
            report.deleted.push(path.clone());
        }

        for path in diff.to_upload() {
            let directory = location.address(&path.parent().unwrap_or_default());
            let local_file = local_root.join(path.to_native());
            debug!(file = %local_file.display(), directory = %directory, "Uploading to stage");
            session
                .upload(&local_file, &directory, role)
                .map_err(|source| Error::Synchronization {
                    operation: SyncOperation::Upload,
                    path: path.clone(),
                    source,
                })?;
            report.uploaded.push(path.clone());
        }

        info!(
            location = %location,
            role = %role,
            deleted = report.deleted.len(),
            uploaded = report.uploaded.len(),
            "Synchronized stage"
        );
        Ok(report)
    }
}

/// Every file below `root` as a root-relative stage path.
fn local_files(root: &Path) -> Result<BTreeSet<StagePath>> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.insert(StagePath::from(relative));
        }
    }
    Ok(files)
}
