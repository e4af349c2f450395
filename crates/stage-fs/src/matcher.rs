//! Matching local files against remote checksums
//!
//! Multi-part checksums do not record the part size the uploader used, so the
//! matcher reconstructs it by trying an ordered list of candidate chunk sizes
//! and stopping at the first one that reproduces the remote checksum.

use crate::checksum::{HashFormat, compute_md5sum};
use crate::constants::{
    DEFAULT_CHUNK_SIZE, MAX_ALIGNED_STEPS, MAX_PARTS, MIN_PART_SIZE, ONE_MEGABYTE,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Tunables for chunk size recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSearch {
    /// The provider's documented default part size.
    pub default_chunk_size: u64,
    /// Alignment of the stepped candidates.
    pub step_size: u64,
    /// How many stepped candidates to consider at most.
    pub max_steps: u64,
    /// Largest part count the provider allows.
    pub max_parts: u64,
    /// Smallest part size the provider allows.
    pub min_part_size: u64,
}

impl Default for ChunkSearch {
    fn default() -> Self {
        Self {
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            step_size: ONE_MEGABYTE,
            max_steps: MAX_ALIGNED_STEPS,
            max_parts: MAX_PARTS,
            min_part_size: MIN_PART_SIZE,
        }
    }
}

/// One source of candidate chunk sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// [`ChunkSearch::default_chunk_size`].
    ProviderDefault,
    /// The smallest multiple of [`ChunkSearch::step_size`] that yields the
    /// remote part count.
    AlignedSteps,
    /// `ceil(size / max_parts)`, raised to [`ChunkSearch::min_part_size`].
    MaxPartsDerived,
}

impl ChunkStrategy {
    /// The order used unless a caller overrides it.
    pub const DEFAULT_ORDER: [ChunkStrategy; 3] = [
        ChunkStrategy::ProviderDefault,
        ChunkStrategy::AlignedSteps,
        ChunkStrategy::MaxPartsDerived,
    ];

    /// Chunk sizes this strategy proposes for a file of `file_size` bytes
    /// that was uploaded in `parts` parts. Only sizes producing exactly
    /// `parts` parts are returned.
    fn candidates(self, search: &ChunkSearch, file_size: u64, parts: u64) -> Vec<u64> {
        match self {
            Self::ProviderDefault => std::iter::once(search.default_chunk_size)
                .filter(|&chunk| part_count(file_size, chunk) == Some(parts))
                .collect(),
            Self::AlignedSteps => {
                if search.step_size == 0 {
                    return Vec::new();
                }
                for step in 1..=search.max_steps {
                    let Some(chunk) = step.checked_mul(search.step_size) else {
                        break;
                    };
                    match part_count(file_size, chunk) {
                        Some(count) if count == parts => return vec![chunk],
                        Some(count) if count < parts => break,
                        _ => {}
                    }
                }
                Vec::new()
            }
            Self::MaxPartsDerived => {
                if search.max_parts == 0 {
                    return Vec::new();
                }
                let chunk = file_size.div_ceil(search.max_parts).max(search.min_part_size);
                std::iter::once(chunk)
                    .filter(|&chunk| part_count(file_size, chunk) == Some(parts))
                    .collect()
            }
        }
    }
}

fn part_count(file_size: u64, chunk: u64) -> Option<u64> {
    (chunk > 0).then(|| file_size.div_ceil(chunk))
}

/// A chunk size under evaluation and the digest it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashCandidate {
    pub chunk_size: Option<u64>,
    pub computed_digest: String,
}

/// Decides whether local content matches a checksum recorded by the stage.
#[derive(Debug, Clone)]
pub struct ContentHashMatcher {
    search: ChunkSearch,
    strategies: Vec<ChunkStrategy>,
}

impl Default for ContentHashMatcher {
    fn default() -> Self {
        Self::new(ChunkSearch::default())
    }
}

impl ContentHashMatcher {
    /// Create a matcher using the default strategy order.
    pub fn new(search: ChunkSearch) -> Self {
        Self {
            search,
            strategies: ChunkStrategy::DEFAULT_ORDER.to_vec(),
        }
    }

    /// Replace the ordered list of candidate strategies.
    pub fn with_strategies(mut self, strategies: impl IntoIterator<Item = ChunkStrategy>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    pub fn search(&self) -> &ChunkSearch {
        &self.search
    }

    /// Ordered, de-duplicated chunk sizes worth hashing for a file of
    /// `file_size` bytes uploaded in `parts` parts.
    ///
    /// Sizes at or above the file size all describe a single part, so only
    /// the first of those is kept.
    pub fn candidate_chunk_sizes(&self, file_size: u64, parts: u64) -> Vec<u64> {
        let mut seen = Vec::new();
        let mut sizes = Vec::new();
        for strategy in &self.strategies {
            for chunk in strategy.candidates(&self.search, file_size, parts) {
                let effective = chunk.min(file_size.max(1));
                if !seen.contains(&effective) {
                    seen.push(effective);
                    sizes.push(chunk);
                }
            }
        }
        sizes
    }

    /// Check whether `local_file` has the content described by `remote_hash`.
    ///
    /// An absent remote hash never matches, so the caller re-uploads rather
    /// than trusting possibly stale content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHashFormat`] if `remote_hash` has an
    /// unrecognized shape, or an I/O error if the file cannot be read.
    pub fn file_matches_md5sum(&self, local_file: &Path, remote_hash: Option<&str>) -> Result<bool> {
        let Some(remote_hash) = remote_hash else {
            return Ok(false);
        };

        match HashFormat::parse(remote_hash)? {
            HashFormat::Simple { digest } => Ok(compute_md5sum(local_file, None)? == digest),
            HashFormat::MultiPart { digest, parts } => {
                let expected = HashFormat::MultiPart { digest, parts }.to_canonical();
                let file_size = std::fs::metadata(local_file)
                    .map_err(|e| Error::io(local_file, e))?
                    .len();

                for chunk in self.candidate_chunk_sizes(file_size, parts) {
                    let candidate = HashCandidate {
                        chunk_size: Some(chunk),
                        computed_digest: compute_md5sum(local_file, Some(chunk))?,
                    };
                    debug!(
                        file = %local_file.display(),
                        chunk_size = chunk,
                        digest = %candidate.computed_digest,
                        "Trying multi-part chunk size"
                    );
                    if candidate.computed_digest == expected {
                        return Ok(true);
                    }
                }

                debug!(file = %local_file.display(), %expected, "No chunk size reproduced remote hash");
                Ok(false)
            }
        }
    }
}

/// [`ContentHashMatcher::file_matches_md5sum`] with default provider settings.
pub fn file_matches_md5sum(local_file: &Path, remote_hash: Option<&str>) -> Result<bool> {
    ContentHashMatcher::default().file_matches_md5sum(local_file, remote_hash)
}
