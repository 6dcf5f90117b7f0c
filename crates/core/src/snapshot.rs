//! Snapshot table: last observed state of every tracked entry

use crate::path::RelPath;
use crate::stat::{EntryKind, StatRecord};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Mapping from root-relative path to last observed stat record
///
/// Ground truth for classifying changes. Keys are ordered, so every
/// directory's subtree is one contiguous key range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<RelPath, StatRecord>,
}

impl Snapshot {
    /// Create a new empty snapshot
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Record `stat` for `path`, returning the previous record
    pub fn insert(&mut self, path: RelPath, stat: StatRecord) -> Option<StatRecord> {
        self.entries.insert(path, stat)
    }

    pub fn get(&self, path: &RelPath) -> Option<&StatRecord> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &RelPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Remove a single entry (its descendants are left alone)
    pub fn remove(&mut self, path: &RelPath) -> Option<StatRecord> {
        self.entries.remove(path)
    }

    /// Entries strictly beneath `dir`, in key order
    pub fn subtree<'a>(
        &'a self,
        dir: &RelPath,
    ) -> impl Iterator<Item = (&'a RelPath, &'a StatRecord)> + 'a {
        let start = dir.subtree_start();
        let dir = dir.clone();
        let range = self
            .entries
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded));
        range.take_while(move |(path, _)| path.is_within(&dir))
    }

    /// Paths strictly beneath `dir`
    pub fn descendants(&self, dir: &RelPath) -> Vec<RelPath> {
        self.subtree(dir).map(|(path, _)| path.clone()).collect()
    }

    /// Remove every entry strictly beneath `dir` and return them
    pub fn remove_subtree(&mut self, dir: &RelPath) -> Vec<(RelPath, StatRecord)> {
        let mut subtree = self.entries.split_off(dir.subtree_start().as_str());
        let mut rest = subtree.split_off(dir.subtree_end().as_str());
        self.entries.append(&mut rest);
        subtree.into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelPath, &StatRecord)> {
        self.entries.iter()
    }

    /// Number of entries of the given kind
    pub fn count_kind(&self, kind: EntryKind) -> usize {
        self.entries.values().filter(|stat| stat.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(RelPath, StatRecord)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (RelPath, StatRecord)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(RelPath, StatRecord)> for Snapshot {
    fn extend<I: IntoIterator<Item = (RelPath, StatRecord)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(path: &str) -> RelPath {
        RelPath::parse(path).unwrap()
    }

    fn sample() -> Snapshot {
        [
            ("a", StatRecord::directory(None)),
            ("a/one.txt", StatRecord::file(1, None)),
            ("a/nested", StatRecord::directory(None)),
            ("a/nested/two.txt", StatRecord::file(2, None)),
            ("a-b", StatRecord::file(3, None)),
            ("a0", StatRecord::file(4, None)),
            ("ab", StatRecord::directory(None)),
            ("ab/three.txt", StatRecord::file(5, None)),
        ]
        .into_iter()
        .map(|(path, stat)| (rel(path), stat))
        .collect()
    }

    #[test]
    fn test_insert_reports_previous() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.insert(rel("f"), StatRecord::file(1, None)).is_none());
        let previous = snapshot.insert(rel("f"), StatRecord::file(2, None));
        assert_eq!(previous, Some(StatRecord::file(1, None)));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_descendants_exclude_lookalike_siblings() {
        let snapshot = sample();
        let descendants = snapshot.descendants(&rel("a"));
        assert_eq!(
            descendants,
            vec![rel("a/nested"), rel("a/nested/two.txt"), rel("a/one.txt")]
        );
        assert!(snapshot.descendants(&rel("a/one.txt")).is_empty());
    }

    #[test]
    fn test_remove_subtree_keeps_directory_and_siblings() {
        let mut snapshot = sample();
        let removed = snapshot.remove_subtree(&rel("a"));

        assert_eq!(removed.len(), 3);
        assert!(snapshot.contains(&rel("a")));
        assert!(snapshot.contains(&rel("a-b")));
        assert!(snapshot.contains(&rel("a0")));
        assert!(snapshot.contains(&rel("ab/three.txt")));
        assert_eq!(snapshot.len(), 5);
    }

    #[test]
    fn test_count_kind() {
        let snapshot = sample();
        assert_eq!(snapshot.count_kind(EntryKind::Directory), 3);
        assert_eq!(snapshot.count_kind(EntryKind::File), 5);
    }
}
