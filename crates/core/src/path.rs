//! Root-relative paths

use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Separator used inside every `RelPath`, on every platform
pub const SEPARATOR: char = '/';

/// Path of an entry relative to the watched root
///
/// Never empty: the root itself has no `RelPath`. Components are joined with
/// [`SEPARATOR`], so two paths naming the same entry always compare equal and
/// a directory's descendants sort directly after `"<dir>/"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    /// Build from a path that is already relative to the root
    ///
    /// Returns `None` for the root itself (empty path), for paths that
    /// escape the root or are absolute, and for names that are not valid
    /// UTF-8 (a lossy conversion would make distinct names collide).
    pub fn new(relative: &Path) -> Option<Self> {
        let mut out = String::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    if !out.is_empty() {
                        out.push(SEPARATOR);
                    }
                    out.push_str(part.to_str()?);
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(Self(out))
        }
    }

    /// Parse a `/`-separated relative path
    pub fn parse(relative: &str) -> Option<Self> {
        Self::new(Path::new(relative))
    }

    /// Relative path of `full` under `root`, or `None` if `full` is the root
    /// or lies outside it
    pub fn from_full(root: &Path, full: &Path) -> Option<Self> {
        full.strip_prefix(root).ok().and_then(Self::new)
    }

    /// Absolute path of this entry under `root`
    pub fn to_full(&self, root: &Path) -> PathBuf {
        let mut full = root.to_path_buf();
        for part in self.0.split(SEPARATOR) {
            full.push(part);
        }
        full
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last component
    pub fn file_name(&self) -> &str {
        match self.0.rsplit_once(SEPARATOR) {
            Some((_, name)) => name,
            None => &self.0,
        }
    }

    /// Parent entry, or `None` when the parent is the root
    pub fn parent(&self) -> Option<RelPath> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| RelPath(parent.to_string()))
    }

    /// True when `self` lies strictly beneath `dir`
    pub fn is_within(&self, dir: &RelPath) -> bool {
        self.0.len() > dir.0.len()
            && self.0.starts_with(dir.0.as_str())
            && self.0.as_bytes()[dir.0.len()] == SEPARATOR as u8
    }

    /// Inclusive lower bound of this directory's subtree in key order
    pub(crate) fn subtree_start(&self) -> String {
        format!("{}{}", self.0, SEPARATOR)
    }

    /// Exclusive upper bound of this directory's subtree in key order
    ///
    /// `0` is the character right after `/`, so every `"<dir>/..."` key sorts
    /// below `"<dir>0"`.
    pub(crate) fn subtree_end(&self) -> String {
        format!("{}0", self.0)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RelPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
