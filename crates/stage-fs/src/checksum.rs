//! MD5 checksum utilities
//!
//! Produces the two checksum shapes a stage reports for stored files: a
//! plain 32-character hex digest, and the multi-part form
//! `<hex>-<parts>` where the hex digest is computed over the concatenated raw
//! digests of each sequential part.

use crate::constants::READ_BUFFER_BYTES;
use crate::{Error, Result};
use md5::{Digest, Md5};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// A plain 32-hex MD5 digest
static MD5_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").unwrap());

/// A multi-part digest: 32 hex characters, a dash, and the part count
static MULTIPART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-fA-F]{32})-(\d+)$").unwrap());

/// A checksum string as reported by the remote provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashFormat {
    /// Whole-object digest.
    Simple { digest: String },
    /// Composite digest over `parts` sequential parts.
    MultiPart { digest: String, parts: u64 },
}

impl HashFormat {
    /// Recognize a provider checksum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHashFormat`] for anything that is neither a
    /// 32-hex digest nor a 32-hex digest followed by `-<N>`.
    pub fn parse(hash: &str) -> Result<Self> {
        let unknown = || Error::UnknownHashFormat {
            hash: hash.to_string(),
        };

        if MD5_RE.is_match(hash) {
            return Ok(Self::Simple {
                digest: hash.to_ascii_lowercase(),
            });
        }

        let captures = MULTIPART_RE.captures(hash).ok_or_else(unknown)?;
        let parts: u64 = captures[2].parse().map_err(|_| unknown())?;
        if parts == 0 {
            return Err(unknown());
        }
        Ok(Self::MultiPart {
            digest: captures[1].to_ascii_lowercase(),
            parts,
        })
    }

    /// The canonical lowercase rendering used for comparisons.
    pub fn to_canonical(&self) -> String {
        match self {
            Self::Simple { digest } => digest.clone(),
            Self::MultiPart { digest, parts } => format!("{}-{}", digest, parts),
        }
    }
}

/// Compute the MD5 checksum of a file.
///
/// Without a chunk size (or with a zero chunk size) the plain hex digest is
/// returned. With a chunk size the multi-part form `<hex>-<parts>` is
/// returned; an empty file always yields the plain empty digest.
///
/// # Errors
///
/// Returns an error if the path is not a regular file or cannot be read.
pub fn compute_md5sum(path: &Path, chunk_size: Option<u64>) -> Result<String> {
    let metadata = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
    if !metadata.is_file() {
        return Err(Error::NotAFile {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    md5sum_from_reader(file, chunk_size).map_err(|e| Error::io(path, e))
}

/// Compute the MD5 checksum of in-memory content.
///
/// Same output shapes as [`compute_md5sum`].
pub fn compute_bytes_md5sum(content: &[u8], chunk_size: Option<u64>) -> String {
    match chunk_size.filter(|&size| size > 0) {
        None => format!("{:x}", Md5::digest(content)),
        Some(size) => {
            let chunk = usize::try_from(size).unwrap_or(usize::MAX);
            let mut concatenated = Vec::new();
            let mut parts = 0u64;
            for part in content.chunks(chunk) {
                concatenated.extend_from_slice(&Md5::digest(part));
                parts += 1;
            }
            finish_multipart(&concatenated, parts)
        }
    }
}

fn md5sum_from_reader<R: Read>(mut reader: R, chunk_size: Option<u64>) -> std::io::Result<String> {
    let mut buffer = vec![0u8; READ_BUFFER_BYTES];
    let mut hasher = Md5::new();

    let Some(chunk) = chunk_size.filter(|&size| size > 0) else {
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        return Ok(format!("{:x}", hasher.finalize()));
    };

    let mut concatenated = Vec::new();
    let mut parts = 0u64;
    let mut remaining_in_part = chunk;
    loop {
        let want = usize::try_from(remaining_in_part)
            .map_or(buffer.len(), |remaining| remaining.min(buffer.len()));
        let read = reader.read(&mut buffer[..want])?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        remaining_in_part -= read as u64;
        if remaining_in_part == 0 {
            concatenated.extend_from_slice(&hasher.finalize_reset());
            parts += 1;
            remaining_in_part = chunk;
        }
    }
    if remaining_in_part != chunk {
        concatenated.extend_from_slice(&hasher.finalize());
        parts += 1;
    }

    Ok(finish_multipart(&concatenated, parts))
}

fn finish_multipart(concatenated: &[u8], parts: u64) -> String {
    if parts == 0 {
        // empty object: providers report the plain digest
        return format!("{:x}", Md5::digest(b""));
    }
    format!("{:x}-{}", Md5::digest(concatenated), parts)
}
