//! Source → destination mapping for a single bundle operation
//!
//! A [`PathMappingResolver`] is built once per bundle operation and owned by
//! its caller. Rules are validated completely when added; the read API never
//! fails for paths it does not know about.

use crate::rules::{ArtifactPair, EntryKind, PathRule, ResolvedRule, normalize_relative};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Options for [`PathMappingResolver::all_mappings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingOptions {
    /// Follow every directory pair with pairs for all of its descendants.
    pub expand_directories: bool,
    /// Join sources onto the project root and destinations onto the deploy root.
    pub absolute: bool,
}

impl MappingOptions {
    pub fn expanded() -> Self {
        Self {
            expand_directories: true,
            absolute: false,
        }
    }

    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }
}

#[derive(Debug, Clone)]
struct SourceEntry {
    source: PathBuf,
    kind: EntryKind,
    destinations: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct DestinationEntry {
    kind: EntryKind,
    /// More than one only for directory fan-in.
    sources: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
struct MappingState {
    sources: Vec<SourceEntry>,
    source_index: HashMap<PathBuf, usize>,
    destinations: HashMap<PathBuf, DestinationEntry>,
    /// Ancestors of explicit destinations.
    implicit_dirs: HashSet<PathBuf>,
}

impl MappingState {
    fn insert(&mut self, pair: ArtifactPair, project_root: &Path) -> Result<()> {
        let ArtifactPair {
            source,
            destination,
            kind,
        } = pair;
        let conflicting_type = |path: &Path| Error::Artifact {
            message: format!(
                "Conflicting type for destination path: {}",
                path.display()
            ),
        };

        if let Some(existing) = self.destinations.get(&destination)
            && existing.kind != kind
        {
            return Err(conflicting_type(&destination));
        }
        if kind == EntryKind::File && self.implicit_dirs.contains(&destination) {
            return Err(conflicting_type(&destination));
        }
        for ancestor in strict_ancestors(&destination) {
            if let Some(entry) = self.destinations.get(ancestor)
                && entry.kind == EntryKind::File
            {
                return Err(conflicting_type(ancestor));
            }
        }

        // an earlier directory mapping already owns this subtree
        if strict_ancestors(&destination).any(|ancestor| {
            self.destinations
                .get(ancestor)
                .is_some_and(|entry| entry.kind == EntryKind::Directory)
        }) {
            return Err(Error::TooManyFiles { destination });
        }
        // this directory would swallow earlier output
        if kind == EntryKind::Directory && self.implicit_dirs.contains(&destination) {
            return Err(Error::TooManyFiles { destination });
        }

        match self.destinations.get_mut(&destination) {
            Some(entry) if entry.sources.contains(&source) => return Ok(()),
            Some(_) if kind == EntryKind::File => {
                return Err(Error::TooManyFiles { destination });
            }
            Some(entry) => {
                check_fan_in(project_root, &entry.sources, &source, &destination)?;
                entry.sources.push(source.clone());
            }
            None => {
                self.destinations.insert(
                    destination.clone(),
                    DestinationEntry {
                        kind,
                        sources: vec![source.clone()],
                    },
                );
            }
        }

        for ancestor in strict_ancestors(&destination) {
            self.implicit_dirs.insert(ancestor.to_path_buf());
        }

        match self.source_index.get(&source) {
            Some(&idx) => self.sources[idx].destinations.push(destination),
            None => {
                self.source_index.insert(source.clone(), self.sources.len());
                self.sources.push(SourceEntry {
                    source,
                    kind,
                    destinations: vec![destination],
                });
            }
        }
        Ok(())
    }
}

/// Reject a directory joining a fan-in when one of its descendants has a
/// different file type than the same path under an earlier source.
fn check_fan_in(
    project_root: &Path,
    earlier: &[PathBuf],
    source: &Path,
    destination: &Path,
) -> Result<()> {
    let walk_root = project_root.join(source);
    for item in WalkDir::new(&walk_root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let item = item.map_err(Error::walk)?;
        let Ok(relative) = item.path().strip_prefix(&walk_root) else {
            continue;
        };
        let is_dir = item.file_type().is_dir();
        for other in earlier {
            let Ok(metadata) = std::fs::metadata(project_root.join(other).join(relative)) else {
                continue;
            };
            if metadata.is_dir() != is_dir {
                return Err(Error::Artifact {
                    message: format!(
                        "Conflicting type for destination path: {}",
                        destination.join(relative).display()
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Ancestors of a relative path, nearest first, excluding the path itself
/// and the (empty) root.
fn strict_ancestors(path: &Path) -> impl Iterator<Item = &Path> {
    path.ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
}

/// Validated, queryable mapping between project sources and deploy paths.
#[derive(Debug)]
pub struct PathMappingResolver {
    project_root: PathBuf,
    deploy_root: PathBuf,
    state: MappingState,
}

impl PathMappingResolver {
    /// Create a resolver for two existing absolute directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRoot`] if either root is relative, missing,
    /// or not a directory.
    pub fn new(project_root: impl AsRef<Path>, deploy_root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            project_root: canonical_root(project_root.as_ref())?,
            deploy_root: canonical_root(deploy_root.as_ref())?,
            state: MappingState::default(),
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn deploy_root(&self) -> &Path {
        &self.deploy_root
    }

    pub fn is_empty(&self) -> bool {
        self.state.sources.is_empty()
    }

    /// Declare a mapping rule.
    ///
    /// The rule is resolved against the filesystem immediately. On error the
    /// resolver is left exactly as it was before the call.
    pub fn add_rule(&mut self, source_pattern: &str, destination: Option<&str>) -> Result<()> {
        self.add(&PathRule {
            source_pattern: source_pattern.to_string(),
            destination: destination.map(str::to_string),
        })
    }

    /// [`add_rule`](Self::add_rule) for an already-built [`PathRule`].
    pub fn add(&mut self, rule: &PathRule) -> Result<()> {
        let resolved = ResolvedRule::resolve(rule, &self.project_root, &self.deploy_root)?;
        let mut next = self.state.clone();
        for pair in resolved.pairs {
            next.insert(pair, &self.project_root)?;
        }
        self.state = next;
        debug!(
            source = %rule.source_pattern,
            destination = ?rule.destination,
            "Added artifact rule"
        );
        Ok(())
    }

    /// Add several rules in order, stopping at the first failure.
    pub fn add_rules<'a>(&mut self, rules: impl IntoIterator<Item = &'a PathRule>) -> Result<()> {
        rules.into_iter().try_for_each(|rule| self.add(rule))
    }

    /// Declared sources, in insertion order, without directory expansion.
    pub fn all_sources(&self, absolute: bool) -> Vec<PathBuf> {
        self.state
            .sources
            .iter()
            .map(|entry| self.source_path(&entry.source, absolute))
            .collect()
    }

    /// Lazily yield every `(source, destination)` pair in insertion order.
    pub fn all_mappings(
        &self,
        options: MappingOptions,
    ) -> impl Iterator<Item = Result<(PathBuf, PathBuf)>> + '_ {
        self.all_mappings_where(options, |_, _| true)
    }

    /// [`all_mappings`](Self::all_mappings) restricted to pairs accepted by
    /// `predicate`.
    ///
    /// The predicate only filters what is yielded: directories it rejects
    /// are still descended into when expanding.
    pub fn all_mappings_where<'a, F>(
        &'a self,
        options: MappingOptions,
        mut predicate: F,
    ) -> impl Iterator<Item = Result<(PathBuf, PathBuf)>> + 'a
    where
        F: FnMut(&Path, &Path) -> bool + 'a,
    {
        self.state
            .sources
            .iter()
            .flat_map(|entry| entry.destinations.iter().map(move |dest| (entry, dest)))
            .flat_map(move |(entry, dest)| self.expand_pair(entry, dest, options))
            .filter(move |item| match item {
                Ok((source, destination)) => predicate(source.as_path(), destination.as_path()),
                Err(_) => true,
            })
    }

    fn expand_pair<'a>(
        &'a self,
        entry: &'a SourceEntry,
        destination: &'a Path,
        options: MappingOptions,
    ) -> Box<dyn Iterator<Item = Result<(PathBuf, PathBuf)>> + 'a> {
        let top = std::iter::once(Ok((
            self.source_path(&entry.source, options.absolute),
            self.deploy_path(destination, options.absolute),
        )));
        if !(options.expand_directories && entry.kind == EntryKind::Directory) {
            return Box::new(top);
        }

        let walk_root = self.project_root.join(&entry.source);
        let descendants = WalkDir::new(&walk_root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .map(move |item| -> Result<(PathBuf, PathBuf)> {
                let item = item.map_err(Error::walk)?;
                let relative = item.path().strip_prefix(&walk_root).map_err(|_| {
                    Error::Artifact {
                        message: format!("{} escaped {}", item.path().display(), walk_root.display()),
                    }
                })?;
                Ok((
                    self.source_path(&entry.source.join(relative), options.absolute),
                    self.deploy_path(&destination.join(relative), options.absolute),
                ))
            });
        Box::new(top.chain(descendants))
    }

    /// Every deploy path produced by `path`, sorted and de-duplicated.
    ///
    /// `path` may be a declared source or any descendant of a declared
    /// directory, relative to the project root or absolute. Absolute input
    /// yields absolute output. Unmapped paths yield an empty list.
    pub fn to_deploy_paths(&self, path: &Path) -> Vec<PathBuf> {
        let absolute = path.is_absolute();
        let Some(relative) = relative_to(&self.project_root, path) else {
            return Vec::new();
        };

        let mut found = BTreeSet::new();
        for entry in &self.state.sources {
            let suffix = if relative == entry.source {
                PathBuf::new()
            } else if entry.kind == EntryKind::Directory {
                match relative.strip_prefix(&entry.source) {
                    Ok(suffix) => suffix.to_path_buf(),
                    Err(_) => continue,
                }
            } else {
                continue;
            };
            for destination in &entry.destinations {
                let deploy = if suffix.as_os_str().is_empty() {
                    destination.clone()
                } else {
                    destination.join(&suffix)
                };
                found.insert(self.deploy_path(&deploy, absolute));
            }
        }
        found.into_iter().collect()
    }

    /// The source that produced `path` (relative to the deploy root or
    /// absolute), or `None` if no rule produced it.
    ///
    /// A path that physically exists in the deploy root without being
    /// produced by a rule (an externally created symlink, say) yields `None`.
    pub fn to_project_path(&self, path: &Path) -> Option<PathBuf> {
        let absolute = path.is_absolute();
        let relative = relative_to(&self.deploy_root, path)?;
        if relative.as_os_str().is_empty() {
            return None;
        }

        if let Some(entry) = self.state.destinations.get(&relative) {
            return entry
                .sources
                .first()
                .map(|source| self.source_path(source, absolute));
        }

        let (ancestor, entry) = strict_ancestors(&relative).find_map(|ancestor| {
            self.state
                .destinations
                .get(ancestor)
                .filter(|entry| entry.kind == EntryKind::Directory)
                .map(|entry| (ancestor, entry))
        })?;
        let suffix = relative.strip_prefix(ancestor).ok()?;
        entry
            .sources
            .iter()
            .map(|source| source.join(suffix))
            .find(|candidate| {
                std::fs::symlink_metadata(self.project_root.join(candidate)).is_ok()
            })
            .map(|candidate| self.source_path(&candidate, absolute))
    }

    fn source_path(&self, relative: &Path, absolute: bool) -> PathBuf {
        if absolute {
            self.project_root.join(relative)
        } else {
            relative.to_path_buf()
        }
    }

    fn deploy_path(&self, relative: &Path, absolute: bool) -> PathBuf {
        if absolute {
            self.deploy_root.join(relative)
        } else {
            relative.to_path_buf()
        }
    }
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(Error::InvalidRoot {
            path: path.to_path_buf(),
            reason: "root must be an absolute path".to_string(),
        });
    }
    let canonical = dunce::canonicalize(path).map_err(|e| Error::InvalidRoot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !canonical.is_dir() {
        return Err(Error::InvalidRoot {
            path: path.to_path_buf(),
            reason: "root must be a directory".to_string(),
        });
    }
    Ok(canonical)
}

/// Express `path` relative to `root`, accepting both relative and absolute
/// input. Absolute paths outside the root yield `None`.
fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return normalize_relative(path);
    }
    if let Ok(stripped) = path.strip_prefix(root) {
        return normalize_relative(stripped);
    }
    // the caller may hold a non-canonical spelling of the root
    let canonical = dunce::canonicalize(path).ok()?;
    normalize_relative(canonical.strip_prefix(root).ok()?)
}
