//! Artifact rule declarations
//!
//! A [`PathRule`] is what a project declares (`src` pattern plus optional
//! `dest`). Adding it to a resolver turns it into a [`RuleKind`] and a list of
//! concrete [`ArtifactPair`]s; nothing downstream re-derives the rule kind.

use crate::{Error, Result};
use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use stage_fs::{ChunkSearch, ConfigStore};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A declared source → destination rule.
///
/// Deserializes from either a bare string (`"app"`) or a table
/// (`{ src = "app/*.py", dest = "python/" }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ArtifactDecl", into = "ArtifactDecl")]
pub struct PathRule {
    /// Project-root-relative path or glob
    pub source_pattern: String,
    /// Deploy-root-relative path; a trailing `/` marks a directory
    pub destination: Option<String>,
}

impl PathRule {
    pub fn new(source_pattern: impl Into<String>, destination: Option<impl Into<String>>) -> Self {
        Self {
            source_pattern: source_pattern.into(),
            destination: destination.map(Into::into),
        }
    }

    /// A rule that mirrors its source layout under the deploy root.
    pub fn mirrored(source_pattern: impl Into<String>) -> Self {
        Self {
            source_pattern: source_pattern.into(),
            destination: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ArtifactDecl {
    Path(String),
    Mapping {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dest: Option<String>,
    },
}

impl From<ArtifactDecl> for PathRule {
    fn from(decl: ArtifactDecl) -> Self {
        match decl {
            ArtifactDecl::Path(src) => PathRule::mirrored(src),
            ArtifactDecl::Mapping { src, dest } => PathRule {
                source_pattern: src,
                destination: dest,
            },
        }
    }
}

impl From<PathRule> for ArtifactDecl {
    fn from(rule: PathRule) -> Self {
        match rule.destination {
            None => ArtifactDecl::Path(rule.source_pattern),
            Some(dest) => ArtifactDecl::Mapping {
                src: rule.source_pattern,
                dest: Some(dest),
            },
        }
    }
}

/// Project configuration consumed by the bundle and diff steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default)]
    pub artifacts: Vec<PathRule>,
    #[serde(default)]
    pub hashing: ChunkSearch,
}

impl ArtifactsConfig {
    /// Load from a `.toml`, `.json` or `.yaml` file.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(ConfigStore::new().load(path)?)
    }
}

/// Whether a destination holds a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// The shape of a rule's source, decided once when the rule is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// A single existing file
    File,
    /// A single existing directory
    Directory,
    /// A glob pattern; `recursive` when it contains `**`
    Glob { recursive: bool },
}

/// One concrete source → destination mapping, both sides root-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: EntryKind,
}

/// A rule after resolution against the filesystem.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pub kind: RuleKind,
    pub pairs: Vec<ArtifactPair>,
}

struct SourceMatch {
    path: PathBuf,
    kind: EntryKind,
}

impl ResolvedRule {
    /// Resolve `rule` against the given (canonical) roots.
    pub fn resolve(rule: &PathRule, project_root: &Path, deploy_root: &Path) -> Result<Self> {
        let pattern = rule.source_pattern.replace('\\', "/");
        if Path::new(&pattern).has_root() || Path::new(&rule.source_pattern).is_absolute() {
            return Err(Error::NotInDeployRoot {
                path: PathBuf::from(&rule.source_pattern),
                root: project_root.to_path_buf(),
            });
        }

        let (kind, matches) = if has_glob_meta(&pattern) {
            let recursive = pattern.contains("**");
            let matches = glob_matches(&pattern, recursive, project_root, deploy_root)?;
            (RuleKind::Glob { recursive }, matches)
        } else {
            let source = normalize_relative(Path::new(&pattern)).ok_or_else(|| {
                Error::NotInDeployRoot {
                    path: PathBuf::from(&rule.source_pattern),
                    root: project_root.to_path_buf(),
                }
            })?;
            if source.as_os_str().is_empty() {
                return Err(Error::Artifact {
                    message: "the project root itself cannot be an artifact source".to_string(),
                });
            }
            if deploy_root.starts_with(project_root.join(&source)) {
                return Err(Error::Artifact {
                    message: format!(
                        "source {} contains the deploy root {}",
                        source.display(),
                        deploy_root.display()
                    ),
                });
            }
            let metadata = std::fs::metadata(project_root.join(&source)).map_err(|_| {
                Error::SourceNotFound {
                    pattern: rule.source_pattern.clone(),
                }
            })?;
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let rule_kind = match kind {
                EntryKind::Directory => RuleKind::Directory,
                EntryKind::File => RuleKind::File,
            };
            (rule_kind, vec![SourceMatch { path: source, kind }])
        };

        if matches.is_empty() {
            return Err(Error::SourceNotFound {
                pattern: rule.source_pattern.clone(),
            });
        }

        let pairs = destinations_for(rule, &kind, matches, deploy_root)?;
        debug!(
            source = %rule.source_pattern,
            kind = ?kind,
            pairs = pairs.len(),
            "Resolved artifact rule"
        );
        Ok(Self { kind, pairs })
    }
}

fn destinations_for(
    rule: &PathRule,
    kind: &RuleKind,
    matches: Vec<SourceMatch>,
    deploy_root: &Path,
) -> Result<Vec<ArtifactPair>> {
    let outside = |path: &str| Error::NotInDeployRoot {
        path: PathBuf::from(path),
        root: deploy_root.to_path_buf(),
    };

    let Some(raw_dest) = rule.destination.as_deref() else {
        // mirror the project layout
        return Ok(matches
            .into_iter()
            .map(|m| ArtifactPair {
                destination: m.path.clone(),
                source: m.path,
                kind: m.kind,
            })
            .collect());
    };

    let dest = raw_dest.replace('\\', "/");
    if Path::new(&dest).has_root() || Path::new(raw_dest).is_absolute() {
        return Err(outside(raw_dest));
    }
    let dest_path = normalize_relative(Path::new(&dest)).ok_or_else(|| outside(raw_dest))?;

    let as_directory = dest.ends_with('/') || matches!(kind, RuleKind::Glob { recursive: true });
    if !as_directory && matches.len() > 1 {
        return Err(Error::TooManyFiles {
            destination: dest_path,
        });
    }

    let mut pairs = Vec::with_capacity(matches.len());
    for m in matches {
        let destination = if as_directory {
            match m.path.file_name() {
                Some(name) => dest_path.join(name),
                None => return Err(outside(raw_dest)),
            }
        } else {
            dest_path.clone()
        };
        if destination.as_os_str().is_empty() {
            return Err(outside(raw_dest));
        }
        pairs.push(ArtifactPair {
            source: m.path,
            destination,
            kind: m.kind,
        });
    }
    Ok(pairs)
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand a glob against the project root.
///
/// `*` never crosses a `/`. Recursive patterns only collect files; the
/// directories they traverse are not mapped themselves. The deploy root and
/// the directories containing it are never matched.
fn glob_matches(
    pattern: &str,
    recursive: bool,
    project_root: &Path,
    deploy_root: &Path,
) -> Result<Vec<SourceMatch>> {
    // walk only below the literal part of the pattern
    let segments: Vec<&str> = pattern.split('/').collect();
    let split = segments
        .iter()
        .position(|segment| has_glob_meta(segment))
        .unwrap_or(segments.len());
    let literal: PathBuf = segments[..split].iter().collect();
    let Some(literal) = normalize_relative(&literal) else {
        return Err(Error::NotInDeployRoot {
            path: PathBuf::from(pattern),
            root: project_root.to_path_buf(),
        });
    };

    // match against the normalized spelling the walk produces
    let normalized = literal
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .chain(segments[split..].iter().map(|segment| segment.to_string()))
        .collect::<Vec<_>>()
        .join("/");
    let matcher = GlobBuilder::new(&normalized)
        .literal_separator(true)
        .build()
        .map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?
        .compile_matcher();

    let walk_root = project_root.join(&literal);
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    let walker = WalkDir::new(&walk_root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != deploy_root);
    for entry in walker {
        let entry = entry.map_err(Error::walk)?;
        let Ok(relative) = entry.path().strip_prefix(project_root) else {
            continue;
        };
        let is_dir = entry.file_type().is_dir();
        if is_dir && (recursive || deploy_root.starts_with(entry.path())) {
            continue;
        }
        let candidate = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if matcher.is_match(&candidate) {
            matches.push(SourceMatch {
                path: relative.to_path_buf(),
                kind: if is_dir {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
            });
        }
    }
    Ok(matches)
}

/// Lexically normalize a relative path.
///
/// Returns `None` for absolute paths and for paths whose `..` segments climb
/// above the root.
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}
