//! Native watches through the `notify` crate

use super::{NativeCallback, NativeEventKind, WatchBackend, WatchHandle};
use crate::error::{Result, WatchError};
use ahash::AHashMap;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

type Routes = Mutex<AHashMap<PathBuf, Route>>;

struct Route {
    /// Registration that owns this route
    id: u64,
    callback: NativeCallback,
}

struct Shared {
    watcher: Mutex<RecommendedWatcher>,
    /// Watched directory -> callback for its children
    routes: Arc<Routes>,
    next_id: AtomicU64,
}

/// [`WatchBackend`] on the platform's recommended `notify` watcher
///
/// One OS watcher serves every directory; each directory is registered
/// non-recursively and events are routed to the callback registered for the
/// event path's parent.
#[derive(Clone)]
pub struct NotifyBackend {
    shared: Arc<Shared>,
}

impl NotifyBackend {
    pub fn new() -> Result<Self> {
        let routes: Arc<Routes> = Arc::default();
        let handler_routes = Arc::clone(&routes);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => dispatch(&handler_routes, event),
            Err(e) => warn!("native watch error: {}", e),
        })
        .map_err(|e| WatchError::Backend {
            path: PathBuf::new(),
            source: Box::new(e),
        })?;

        Ok(Self {
            shared: Arc::new(Shared {
                watcher: Mutex::new(watcher),
                routes,
                next_id: AtomicU64::new(0),
            }),
        })
    }

    /// Number of directories currently registered
    pub fn watched_dirs(&self) -> usize {
        self.shared.routes.lock().len()
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&self, dir: &Path, callback: NativeCallback) -> Result<Box<dyn WatchHandle>> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        // Route first so events racing the registration are not dropped
        self.shared
            .routes
            .lock()
            .insert(dir.to_path_buf(), Route { id, callback });

        let registered = self
            .shared
            .watcher
            .lock()
            .watch(dir, RecursiveMode::NonRecursive);

        if let Err(e) = registered {
            self.shared.routes.lock().remove(dir);
            return Err(registration_error(dir, e));
        }

        Ok(Box::new(NotifyWatch {
            id,
            dir: dir.to_path_buf(),
            shared: Arc::clone(&self.shared),
            open: true,
        }))
    }
}

/// A directory that vanished before registration is an ordinary absence;
/// anything else (watch limits, descriptor exhaustion) is a backend failure.
fn registration_error(dir: &Path, e: notify::Error) -> WatchError {
    let vanished = match &e.kind {
        notify::ErrorKind::PathNotFound => true,
        notify::ErrorKind::Io(io_err) => io_err.kind() == io::ErrorKind::NotFound,
        _ => false,
    };

    if vanished {
        WatchError::Stat {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, e.to_string()),
        }
    } else {
        WatchError::Backend {
            path: dir.to_path_buf(),
            source: Box::new(e),
        }
    }
}

fn dispatch(routes: &Routes, event: Event) {
    let Some(kind) = classify(&event.kind) else {
        return;
    };

    for path in &event.paths {
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            continue;
        };

        // Never hold the route lock while running a callback
        let callback = routes.lock().get(dir).map(|route| Arc::clone(&route.callback));
        match callback {
            Some(callback) => callback(kind, name),
            None => trace!(path = %path.display(), "native event outside watched directories"),
        }
    }
}

fn classify(kind: &EventKind) -> Option<NativeEventKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) => Some(NativeEventKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(NativeEventKind::Renamed),
        EventKind::Modify(_) => Some(NativeEventKind::Modified),
        EventKind::Remove(_) => Some(NativeEventKind::Removed),
        EventKind::Any | EventKind::Other => Some(NativeEventKind::Other),
    }
}

struct NotifyWatch {
    id: u64,
    dir: PathBuf,
    shared: Arc<Shared>,
    open: bool,
}

impl WatchHandle for NotifyWatch {
    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        // A newer registration for the same directory keeps its route
        let mut routes = self.shared.routes.lock();
        if routes.get(&self.dir).map(|route| route.id) != Some(self.id) {
            return;
        }
        routes.remove(&self.dir);
        drop(routes);

        if let Err(e) = self.shared.watcher.lock().unwatch(&self.dir) {
            // The OS drops watches on deleted directories by itself
            trace!(dir = %self.dir.display(), error = %e, "unwatch failed");
        }
    }
}

impl Drop for NotifyWatch {
    fn drop(&mut self) {
        self.close();
    }
}
