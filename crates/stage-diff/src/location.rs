//! Stage addressing
//!
//! A listing of a named stage reports names prefixed with the stage name
//! (`my_stage/app/main.py`), while the user stage may report them bare or
//! under `~`. Both normalize to the same [`StagePath`] relative to the
//! location being diffed.

use crate::{Error, Result};
use stage_fs::StagePath;

/// Which stage a location points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageKind {
    /// The session user's stage, `@~`
    User,
    /// A named stage; `name` is unqualified and unquoted
    Named { name: String },
}

/// A parsed remote location such as `@db.schema.stage/app/v1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLocation {
    kind: StageKind,
    /// Address prefix without sub-directory, e.g. `@db.schema.stage`
    prefix: String,
    subpath: StagePath,
}

impl StageLocation {
    /// Parse `@~[/sub]` or `[@]db.schema.name[/sub]`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidLocation {
            location: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let body = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(invalid("missing stage name"));
        }

        let (stage, subpath) = match body.split_once('/') {
            Some((stage, rest)) => (stage, StagePath::from(rest)),
            None => (body, StagePath::default()),
        };

        if stage == "~" {
            return Ok(Self {
                kind: StageKind::User,
                prefix: "@~".to_string(),
                subpath,
            });
        }

        let name = stage
            .rsplit('.')
            .next()
            .map(|name| name.trim_matches('"'))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("missing stage name"))?;
        if stage.split('.').any(str::is_empty) {
            return Err(invalid("empty identifier in stage name"));
        }

        Ok(Self {
            kind: StageKind::Named {
                name: name.to_string(),
            },
            prefix: format!("@{}", stage),
            subpath,
        })
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    /// Sub-directory of the stage this location points at.
    pub fn subpath(&self) -> &StagePath {
        &self.subpath
    }

    /// The same stage, one or more levels deeper.
    pub fn join(&self, segment: &str) -> Self {
        Self {
            kind: self.kind.clone(),
            prefix: self.prefix.clone(),
            subpath: self.subpath.join(segment),
        }
    }

    /// Fully qualified address of `path`, which is relative to this location.
    pub fn address(&self, path: &StagePath) -> String {
        let full = self.subpath.join(path.as_str());
        if full.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix, full)
        }
    }

    /// Map a name reported by a listing onto a stage path relative to this
    /// location. Names outside the location (or naming the location itself)
    /// yield `None`.
    pub fn to_stage_path(&self, listed_name: &str) -> Option<StagePath> {
        let listed = StagePath::from(listed_name.trim_start_matches('@'));
        let mut segments = listed.segments();
        let first = segments.next()?;

        let drop_first = match &self.kind {
            StageKind::User => first == "~",
            StageKind::Named { name } => first.trim_matches('"').eq_ignore_ascii_case(name),
        };
        let unprefixed = if drop_first {
            StagePath::from(segments.collect::<Vec<_>>().join("/"))
        } else {
            listed.clone()
        };

        unprefixed
            .strip_prefix(&self.subpath)
            .filter(|relative| !relative.is_empty())
    }
}

impl std::fmt::Display for StageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address(&StagePath::default()))
    }
}
