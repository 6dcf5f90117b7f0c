//! Watch backend driven by hand
//!
//! Records every registered directory and lets a test deliver a native
//! notification for any child of a watched directory.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use treewatch::platform::NativeCallback;
use treewatch::{NativeEventKind, Result, WatchBackend, WatchError, WatchHandle};

#[derive(Default)]
struct State {
    callbacks: BTreeMap<PathBuf, (u64, NativeCallback)>,
    next_id: u64,
    registrations: usize,
    /// Directories whose registration fails fatally
    broken: BTreeSet<PathBuf>,
}

#[derive(Clone, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<State>>,
}

impl ManualBackend {
    /// Directories with an open watch
    pub fn watched(&self) -> BTreeSet<PathBuf> {
        self.state.lock().callbacks.keys().cloned().collect()
    }

    /// Total successful registrations, including closed ones
    pub fn registrations(&self) -> usize {
        self.state.lock().registrations
    }

    /// Make any future registration of `dir` fail as the OS would when
    /// out of watch descriptors
    pub fn break_dir(&self, dir: impl AsRef<Path>) {
        self.state.lock().broken.insert(dir.as_ref().to_path_buf());
    }

    /// Report a change to `path` through its parent's watch
    ///
    /// Returns false when the parent is not watched, in which case nothing
    /// is delivered.
    pub fn notify(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };

        let callback = self
            .state
            .lock()
            .callbacks
            .get(dir)
            .map(|(_, callback)| Arc::clone(callback));
        match callback {
            Some(callback) => {
                callback(NativeEventKind::Other, name);
                true
            }
            None => false,
        }
    }
}

impl WatchBackend for ManualBackend {
    fn watch(&self, dir: &Path, callback: NativeCallback) -> Result<Box<dyn WatchHandle>> {
        let mut state = self.state.lock();
        if state.broken.contains(dir) {
            return Err(WatchError::Backend {
                path: dir.to_path_buf(),
                source: Box::new(io::Error::new(io::ErrorKind::Other, "watch limit reached")),
            });
        }

        state.next_id += 1;
        state.registrations += 1;
        let id = state.next_id;
        state.callbacks.insert(dir.to_path_buf(), (id, callback));

        Ok(Box::new(ManualWatch {
            id,
            dir: dir.to_path_buf(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct ManualWatch {
    id: u64,
    dir: PathBuf,
    state: Arc<Mutex<State>>,
}

impl WatchHandle for ManualWatch {
    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.callbacks.get(&self.dir).map(|(id, _)| *id) == Some(self.id) {
            state.callbacks.remove(&self.dir);
        }
    }
}

impl Drop for ManualWatch {
    fn drop(&mut self) {
        self.close();
    }
}
