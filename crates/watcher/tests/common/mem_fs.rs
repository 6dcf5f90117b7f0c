//! In-memory file system for deterministic reconciliation tests
//!
//! Paths are absolute and nodes live in one ordered map. Every mutation
//! advances a logical clock used as the mtime, so successive writes always
//! produce distinct stat records.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use treewatch::{FileSystem, StatRecord};

#[derive(Debug, Clone)]
enum Node {
    File { size: u64, mtime: SystemTime },
    Dir { mtime: SystemTime },
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    clock: u64,
    /// Directories whose listing fails
    unlistable: BTreeSet<PathBuf>,
    /// Names listed under their parent that no longer stat
    phantoms: BTreeSet<PathBuf>,
}

impl State {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + self.clock)
    }

    fn subtree_keys(&self, path: &Path) -> Vec<PathBuf> {
        self.nodes
            .keys()
            .filter(|key| key.starts_with(path))
            .cloned()
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct MemFs {
    state: Arc<Mutex<State>>,
}

impl MemFs {
    /// A file system holding only the directory `root`
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let fs = Self::default();
        fs.mkdir(root);
        fs
    }

    pub fn mkdir(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock();
        let mtime = state.tick();
        state
            .nodes
            .insert(path.as_ref().to_path_buf(), Node::Dir { mtime });
    }

    /// Create or overwrite a file
    pub fn write(&self, path: impl AsRef<Path>, size: u64) {
        let mut state = self.state.lock();
        let mtime = state.tick();
        state
            .nodes
            .insert(path.as_ref().to_path_buf(), Node::File { size, mtime });
    }

    /// Remove `path` and everything beneath it
    pub fn remove(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock();
        for key in state.subtree_keys(path.as_ref()) {
            state.nodes.remove(&key);
        }
    }

    /// Move `from` and everything beneath it to `to`
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) {
        let (from, to) = (from.as_ref(), to.as_ref());
        let mut state = self.state.lock();
        for key in state.subtree_keys(from) {
            if let Some(node) = state.nodes.remove(&key) {
                let suffix = key.strip_prefix(from).unwrap();
                let target = if suffix.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(suffix)
                };
                state.nodes.insert(target, node);
            }
        }
    }

    /// Make listing `dir` fail with a permission error
    pub fn deny_listing(&self, dir: impl AsRef<Path>) {
        self.state.lock().unlistable.insert(dir.as_ref().to_path_buf());
    }

    pub fn allow_listing(&self, dir: impl AsRef<Path>) {
        self.state.lock().unlistable.remove(dir.as_ref());
    }

    /// List `path` under its parent while stat keeps reporting it missing,
    /// as when an entry is deleted between a listing and the stat
    pub fn add_phantom(&self, path: impl AsRef<Path>) {
        self.state.lock().phantoms.insert(path.as_ref().to_path_buf());
    }

    /// Every path strictly beneath `root`
    pub fn paths_under(&self, root: impl AsRef<Path>) -> BTreeSet<PathBuf> {
        let root = root.as_ref();
        self.state
            .lock()
            .nodes
            .keys()
            .filter(|key| key.starts_with(root) && key.as_path() != root)
            .cloned()
            .collect()
    }

    /// Every directory at or beneath `root`
    pub fn dirs_under(&self, root: impl AsRef<Path>) -> BTreeSet<PathBuf> {
        let root = root.as_ref();
        self.state
            .lock()
            .nodes
            .iter()
            .filter(|(key, node)| key.starts_with(root) && matches!(node, Node::Dir { .. }))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

#[async_trait]
impl FileSystem for MemFs {
    async fn stat(&self, path: &Path) -> io::Result<StatRecord> {
        match self.state.lock().nodes.get(path) {
            Some(Node::File { size, mtime }) => Ok(StatRecord::file(*size, Some(*mtime))),
            Some(Node::Dir { mtime }) => Ok(StatRecord::directory(Some(*mtime))),
            None => Err(not_found(path)),
        }
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let state = self.state.lock();
        match state.nodes.get(path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{}: not a directory", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }
        if state.unlistable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{}: permission denied", path.display()),
            ));
        }

        Ok(state
            .nodes
            .keys()
            .chain(state.phantoms.iter())
            .filter(|key| key.parent() == Some(path))
            .filter_map(|key| key.file_name().map(|name| name.to_os_string()))
            .collect())
    }
}
