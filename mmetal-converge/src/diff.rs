//! Pure desired-state differ. No I/O, no side effects.

use std::collections::BTreeSet;
use std::fmt;

/// One tag mutation the differ decided on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    Add(String),
    Remove(String),
}

impl fmt::Display for TagChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagChange::Add(tag) => write!(f, "+{tag}"),
            TagChange::Remove(tag) => write!(f, "-{tag}"),
        }
    }
}

/// Minimal set of tag mutations taking `current` to `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Flatten into apply order: additions first, then removals.
    pub fn changes(&self) -> Vec<TagChange> {
        self.added
            .iter()
            .cloned()
            .map(TagChange::Add)
            .chain(self.removed.iter().cloned().map(TagChange::Remove))
            .collect()
    }
}

/// Compute `added = desired − current` and `removed = current − desired`.
///
/// Membership-only semantics: input order is irrelevant and duplicates
/// collapse. An empty `desired` means every current tag gets removed. Output
/// is sorted, so equal inputs always produce equal diffs.
pub fn diff_tags(current: &[String], desired: &[String]) -> TagDiff {
    let current: BTreeSet<&str> = current.iter().map(String::as_str).collect();
    let desired: BTreeSet<&str> = desired.iter().map(String::as_str).collect();

    TagDiff {
        added: desired
            .difference(&current)
            .map(|t| (*t).to_string())
            .collect(),
        removed: current
            .difference(&desired)
            .map(|t| (*t).to_string())
            .collect(),
    }
}
