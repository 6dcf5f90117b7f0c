//! Host facilities the watcher is built on
//!
//! - [`WatchBackend`]: per-directory native change notification
//! - [`FileSystem`]: stat and directory listing
//!
//! Both are traits so the reconciliation engine can run against the real host
//! ([`NotifyBackend`], [`HostFs`]) or against in-memory stand-ins.

mod host_fs;
mod notify_backend;

pub use host_fs::HostFs;
pub use notify_backend::NotifyBackend;

use crate::error::Result;
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use treewatch_core::StatRecord;

/// What the native primitive reported; advisory only, never trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEventKind {
    Created,
    Modified,
    Removed,
    Renamed,
    Other,
}

/// Invoked with the event kind and the name of the affected child
pub type NativeCallback = Arc<dyn Fn(NativeEventKind, &OsStr) + Send + Sync>;

/// Native per-directory watch registration
pub trait WatchBackend: Send + Sync {
    /// Watch `dir` (non-recursively); `callback` fires for changes to its
    /// immediate children
    fn watch(&self, dir: &Path, callback: NativeCallback) -> Result<Box<dyn WatchHandle>>;
}

/// An active native watch
///
/// `close` is idempotent. Implementations also close on drop.
pub trait WatchHandle: Send + Sync {
    fn close(&mut self);
}

/// Stat and directory listing
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Stat without following symlinks
    async fn stat(&self, path: &Path) -> io::Result<StatRecord>;

    /// Names of the immediate children of `path`
    async fn list(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Resolve the root to the form the native backend reports
    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}
