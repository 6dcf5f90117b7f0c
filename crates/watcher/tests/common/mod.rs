//! Common utilities for integration tests

#![allow(dead_code)]

pub mod manual_backend;
pub mod mem_fs;

pub use manual_backend::ManualBackend;
pub use mem_fs::MemFs;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use treewatch::{EventStream, RelPath, TreeEvent, TreeWatcher, WatcherConfig};

pub const ROOT: &str = "/tree";
pub const DEBOUNCE_MS: u64 = 10;

/// Route watcher logs to the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn full(rel: &str) -> PathBuf {
    Path::new(ROOT).join(rel)
}

pub fn rel(path: &str) -> RelPath {
    RelPath::parse(path).unwrap()
}

/// A small project:
///
/// ```text
/// /tree
/// ├── a.txt
/// ├── docs/
/// └── src/
///     ├── lib.rs
///     ├── main.rs
///     └── nested/
///         └── deep.rs
/// ```
pub fn sample_tree() -> MemFs {
    let fs = MemFs::with_root(ROOT);
    fs.write(full("a.txt"), 1);
    fs.mkdir(full("docs"));
    fs.mkdir(full("src"));
    fs.write(full("src/lib.rs"), 2);
    fs.write(full("src/main.rs"), 3);
    fs.mkdir(full("src/nested"));
    fs.write(full("src/nested/deep.rs"), 4);
    fs
}

pub fn config() -> WatcherConfig {
    WatcherConfig::new(ROOT).with_debounce_ms(DEBOUNCE_MS)
}

/// Watcher over `fs` and `backend` with the default test configuration
pub fn watcher(fs: &MemFs, backend: &ManualBackend) -> TreeWatcher {
    TreeWatcher::new(config())
        .unwrap()
        .with_file_system(fs.clone())
        .with_backend(backend.clone())
}

/// Initialized watcher plus a subscription taken before initialization
pub async fn start(fs: &MemFs, backend: &ManualBackend) -> (TreeWatcher, EventStream) {
    init_tracing();
    let mut watcher = watcher(fs, backend);
    let events = watcher.subscribe();
    watcher.initialize().await.unwrap();
    (watcher, events)
}

/// Let every debounce window elapse and the reconciler go idle
///
/// Meant for paused-clock tests, where the sleep auto-advances.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 10)).await;
}

/// Paths of `events` in order of emission
pub fn paths(events: &[TreeEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| event.path().as_str().to_string())
        .collect()
}

/// At quiescence the snapshot mirrors the file system and every directory
/// (root included) carries exactly one watch
pub fn assert_quiescent(watcher: &TreeWatcher, fs: &MemFs, backend: &ManualBackend) {
    let snapshot = watcher.snapshot().unwrap();
    let tracked: BTreeSet<PathBuf> = snapshot
        .iter()
        .map(|(path, _)| path.to_full(Path::new(ROOT)))
        .collect();
    assert_eq!(tracked, fs.paths_under(ROOT));
    assert_eq!(backend.watched(), fs.dirs_under(ROOT));
}
