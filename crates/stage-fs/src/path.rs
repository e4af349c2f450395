//! Stage path handling
//!
//! A stage path is the identity key used when comparing a local deploy tree
//! with a remote listing: relative, forward-slash separated, free of `.` and
//! `..` segments.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// A relative path normalized to forward slashes.
///
/// Normalization is purely lexical: backslashes become `/`, empty and `.`
/// segments are dropped, `..` pops the previous segment and is ignored at
/// the root, and any leading `/` is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StagePath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl StagePath {
    /// Create a new StagePath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::from_str_lossy(&path.as_ref().to_string_lossy())
    }

    fn from_str_lossy(raw: &str) -> Self {
        let normalized = raw.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self {
            inner: segments.join("/"),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// True for the stage root itself.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        self.inner.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Join this path with a segment, normalizing the result.
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            return Self::from_str_lossy(segment);
        }
        Self::from_str_lossy(&format!("{}/{}", self.inner, segment))
    }

    /// Get the parent directory. The root has no parent; a top-level entry
    /// has the root as its parent.
    pub fn parent(&self) -> Option<Self> {
        if self.inner.is_empty() {
            return None;
        }
        match self.inner.rfind('/') {
            Some(idx) => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            None => Some(Self::default()),
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Segment-aware prefix test: `app/main.py` starts with `app` but not with `ap`.
    pub fn starts_with(&self, prefix: &StagePath) -> bool {
        if prefix.is_empty() {
            return true;
        }
        self.inner == prefix.inner
            || (self.inner.starts_with(&prefix.inner)
                && self.inner.as_bytes().get(prefix.inner.len()) == Some(&b'/'))
    }

    /// Remove a leading prefix, returning `None` if `prefix` is not an ancestor
    /// (or equal).
    pub fn strip_prefix(&self, prefix: &StagePath) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        let rest = self.inner[prefix.inner.len()..].trim_start_matches('/');
        Some(Self {
            inner: rest.to_string(),
        })
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }
}

impl AsRef<Path> for StagePath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for StagePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for StagePath {
    fn from(s: &str) -> Self {
        Self::from_str_lossy(s)
    }
}

impl From<String> for StagePath {
    fn from(s: String) -> Self {
        Self::from_str_lossy(&s)
    }
}

impl From<PathBuf> for StagePath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for StagePath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

impl Serialize for StagePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for StagePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_str_lossy(&raw))
    }
}
