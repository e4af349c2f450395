//! Materializing a deploy root from a resolver's mapping

use crate::resolver::{MappingOptions, PathMappingResolver};
use crate::{Error, Result};
use std::fs;
use tracing::{debug, info};

/// Copy every mapped file into the deploy root.
///
/// Directories are created as needed; existing files at a destination are
/// overwritten. Returns the number of files written.
pub fn build_bundle(resolver: &PathMappingResolver) -> Result<usize> {
    let mut written = 0;
    for pair in resolver.all_mappings(MappingOptions::expanded().absolute()) {
        let (source, destination) = pair?;
        let metadata = fs::metadata(&source).map_err(|e| Error::io(&source, e))?;

        if metadata.is_dir() {
            fs::create_dir_all(&destination).map_err(|e| Error::io(&destination, e))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::copy(&source, &destination).map_err(|e| Error::io(&destination, e))?;
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            "Copied artifact"
        );
        written += 1;
    }

    info!(
        files = written,
        deploy_root = %resolver.deploy_root().display(),
        "Bundle built"
    );
    Ok(written)
}

/// Remove everything inside the deploy root, keeping the root itself.
pub fn clean_deploy_root(resolver: &PathMappingResolver) -> Result<()> {
    let root = resolver.deploy_root();
    for entry in fs::read_dir(root).map_err(|e| Error::io(root, e))? {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }
    }
    Ok(())
}
