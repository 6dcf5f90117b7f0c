//! Active native watches, keyed by directory

use crate::platform::WatchHandle;
use std::collections::BTreeMap;
use std::ops::Bound;
use treewatch_core::RelPath;

/// Directory -> open watch handle
///
/// Removing an entry always closes its handle, so the table and the set of
/// open native watches never disagree.
#[derive(Default)]
pub(crate) struct WatchTable {
    root: Option<Box<dyn WatchHandle>>,
    dirs: BTreeMap<RelPath, Box<dyn WatchHandle>>,
}

impl WatchTable {
    /// Store a handle; `None` is the root. A handle already stored for the
    /// same directory is closed.
    pub(crate) fn insert(&mut self, dir: Option<RelPath>, handle: Box<dyn WatchHandle>) {
        let previous = match dir {
            Some(dir) => self.dirs.insert(dir, handle),
            None => self.root.replace(handle),
        };
        if let Some(mut previous) = previous {
            previous.close();
        }
    }

    pub(crate) fn contains(&self, dir: &RelPath) -> bool {
        self.dirs.contains_key(dir)
    }

    /// True when `dir` or anything beneath it is watched
    pub(crate) fn covers(&self, dir: &RelPath) -> bool {
        self.contains(dir) || self.subtree_keys(dir).next().is_some()
    }

    /// Close and remove the watch for `dir` and every watch beneath it
    pub(crate) fn close_subtree(&mut self, dir: &RelPath) -> usize {
        let nested: Vec<RelPath> = self.subtree_keys(dir).cloned().collect();
        let mut closed = 0;
        for key in std::iter::once(dir).chain(nested.iter()) {
            if let Some(mut handle) = self.dirs.remove(key) {
                handle.close();
                closed += 1;
            }
        }
        closed
    }

    /// Close and remove every watch, the root's included
    pub(crate) fn close_all(&mut self) -> usize {
        let mut closed = 0;
        if let Some(mut root) = self.root.take() {
            root.close();
            closed += 1;
        }
        for (_, mut handle) in std::mem::take(&mut self.dirs) {
            handle.close();
            closed += 1;
        }
        closed
    }

    pub(crate) fn len(&self) -> usize {
        self.dirs.len() + usize::from(self.root.is_some())
    }

    fn subtree_keys<'a>(&'a self, dir: &RelPath) -> impl Iterator<Item = &'a RelPath> + 'a {
        let start = format!("{dir}/");
        let dir = dir.clone();
        self.dirs
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(move |key| key.is_within(&dir))
    }
}
