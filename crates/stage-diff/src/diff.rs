//! Diff result types

use serde::{Deserialize, Serialize};
use stage_fs::StagePath;
use std::collections::BTreeSet;

/// Classification of every path found locally or on the stage.
///
/// The four sets are pairwise disjoint and together cover every local and
/// remote path of the diffed trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Present locally, absent on the stage
    pub only_local: BTreeSet<StagePath>,
    /// Present on the stage, absent locally
    pub only_on_stage: BTreeSet<StagePath>,
    /// Present on both sides with different (or unknown) content
    pub different: BTreeSet<StagePath>,
    /// Present on both sides with matching content
    pub identical: BTreeSet<StagePath>,
}

impl DiffResult {
    /// True if a sync would modify the stage.
    pub fn has_changes(&self) -> bool {
        !(self.only_local.is_empty() && self.only_on_stage.is_empty() && self.different.is_empty())
    }

    /// True if no path was seen on either side.
    pub fn is_empty(&self) -> bool {
        !self.has_changes() && self.identical.is_empty()
    }

    /// Paths a sync uploads, in order.
    pub fn to_upload(&self) -> impl Iterator<Item = &StagePath> {
        self.only_local.union(&self.different)
    }

    /// Every classified path.
    pub fn all_paths(&self) -> BTreeSet<&StagePath> {
        self.only_local
            .iter()
            .chain(&self.only_on_stage)
            .chain(&self.different)
            .chain(&self.identical)
            .collect()
    }

    /// Keep only the pending changes that touch `subset`.
    ///
    /// `identical` is informational and passes through unfiltered.
    pub fn preserve(&self, subset: &BTreeSet<StagePath>) -> DiffResult {
        let keep = |paths: &BTreeSet<StagePath>| paths.intersection(subset).cloned().collect();
        DiffResult {
            only_local: keep(&self.only_local),
            only_on_stage: keep(&self.only_on_stage),
            different: keep(&self.different),
            identical: self.identical.clone(),
        }
    }
}

/// Narrow `diff` to the stage paths in `subset`; see [`DiffResult::preserve`].
pub fn preserve_from_diff<'a>(
    diff: &DiffResult,
    subset: impl IntoIterator<Item = &'a StagePath>,
) -> DiffResult {
    let subset: BTreeSet<StagePath> = subset.into_iter().cloned().collect();
    diff.preserve(&subset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(items: &[&str]) -> BTreeSet<StagePath> {
        items.iter().map(|p| StagePath::from(*p)).collect()
    }

    fn sample() -> DiffResult {
        DiffResult {
            only_local: paths(&["a.py", "b.py"]),
            only_on_stage: paths(&["old.py", "stale/x.sql"]),
            different: paths(&["setup.sql"]),
            identical: paths(&["README.md", "same.py"]),
        }
    }

    #[test]
    fn preserve_filters_changes_but_not_identical() {
        let subset = paths(&["a.py", "old.py", "README.md"]);
        let preserved = preserve_from_diff(&sample(), &subset);

        assert_eq!(
            preserved,
            DiffResult {
                only_local: paths(&["a.py"]),
                only_on_stage: paths(&["old.py"]),
                different: BTreeSet::new(),
                identical: paths(&["README.md", "same.py"]),
            }
        );
    }

    #[test]
    fn upload_order_merges_local_and_different() {
        let diff = sample();
        let order: Vec<&str> = diff.to_upload().map(StagePath::as_str).collect();
        assert_eq!(order, vec!["a.py", "b.py", "setup.sql"]);
    }

    #[test]
    fn upload_order_interleaves_both_sets() {
        let diff = DiffResult {
            only_local: paths(&["b.py", "d.py"]),
            different: paths(&["a.py", "c.py", "e.py"]),
            ..DiffResult::default()
        };
        let order: Vec<&str> = diff.to_upload().map(StagePath::as_str).collect();
        assert_eq!(order, vec!["a.py", "b.py", "c.py", "d.py", "e.py"]);
    }

    #[test]
    fn change_detection() {
        assert!(sample().has_changes());
        assert!(DiffResult::default().is_empty());

        let clean = DiffResult {
            identical: paths(&["a.py"]),
            ..DiffResult::default()
        };
        assert!(!clean.has_changes());
        assert!(!clean.is_empty());
    }

    #[test]
    fn serializes_as_path_lists() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["only_local"], serde_json::json!(["a.py", "b.py"]));
    }
}
