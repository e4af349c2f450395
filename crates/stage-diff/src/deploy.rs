//! Deploy orchestration
//!
//! Ties a [`PathMappingResolver`] to a [`ContentDiffEngine`]: diff the
//! resolver's deploy root against a stage location, narrow the diff to the
//! artifacts the caller asked for, and apply it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use stage_bundle::PathMappingResolver;
use stage_fs::StagePath;
use tracing::{info, warn};

use crate::diff::DiffResult;
use crate::engine::ContentDiffEngine;
use crate::location::StageLocation;
use crate::remote::RemoteStage;
use crate::{Error, Result};

/// What to deploy and how.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Role the stage mutations run under
    pub role: String,
    pub location: StageLocation,
    /// Delete stage files that no longer exist locally
    pub prune: bool,
    /// Project paths to restrict the deploy to; `None` deploys everything
    pub paths: Option<Vec<PathBuf>>,
}

impl DeployRequest {
    pub fn new(role: impl Into<String>, location: StageLocation) -> Self {
        Self {
            role: role.into(),
            location,
            prune: false,
            paths: None,
        }
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_paths(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }
}

/// Diff the deploy root of `resolver` against the requested location and
/// synchronize it.
///
/// The deploy root is expected to be materialized already (see
/// [`stage_bundle::build_bundle`]). Returns the diff that was applied.
///
/// # Errors
///
/// Returns [`Error::UnmappedPath`] if a requested path is not produced by
/// any rule, and propagates diff and sync failures.
pub fn deploy<S: RemoteStage>(
    engine: &mut ContentDiffEngine<S>,
    resolver: &PathMappingResolver,
    request: &DeployRequest,
) -> Result<DiffResult> {
    let deploy_root = resolver.deploy_root();
    let mut diff = engine.compute(deploy_root, &request.location)?;

    if let Some(paths) = &request.paths {
        let prefixes = requested_prefixes(resolver, paths)?;
        let subset: BTreeSet<StagePath> = diff
            .all_paths()
            .into_iter()
            .filter(|path| prefixes.iter().any(|prefix| path.starts_with(prefix)))
            .cloned()
            .collect();
        diff = diff.preserve(&subset);
    }

    if !request.prune && !diff.only_on_stage.is_empty() {
        warn!(
            count = diff.only_on_stage.len(),
            location = %request.location,
            "Stage files with no local counterpart are kept; deploy with prune to remove them"
        );
        for path in &diff.only_on_stage {
            warn!(path = %path, "Retained stage file");
        }
        diff.only_on_stage.clear();
    }

    let report = engine.sync(&request.role, &diff, deploy_root, &request.location)?;
    info!(
        location = %request.location,
        uploaded = report.uploaded.len(),
        deleted = report.deleted.len(),
        "Deploy finished"
    );
    Ok(diff)
}

/// Deploy-root-relative prefixes produced by the requested project paths.
fn requested_prefixes(resolver: &PathMappingResolver, paths: &[PathBuf]) -> Result<Vec<StagePath>> {
    let mut prefixes = Vec::new();
    for path in paths {
        let deployed = resolver.to_deploy_paths(path);
        if deployed.is_empty() {
            return Err(Error::UnmappedPath { path: path.clone() });
        }
        prefixes.extend(
            deployed
                .iter()
                .map(|deploy_path| relative_stage_path(resolver.deploy_root(), deploy_path)),
        );
    }
    Ok(prefixes)
}

fn relative_stage_path(deploy_root: &Path, deploy_path: &Path) -> StagePath {
    StagePath::from(deploy_path.strip_prefix(deploy_root).unwrap_or(deploy_path))
}
