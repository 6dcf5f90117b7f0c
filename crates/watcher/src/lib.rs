//! Debounced file system watching for directory trees
//!
//! This crate provides:
//! - Recursive enumeration with one native watch per directory
//! - Per-path debouncing of native notifications
//! - Reconciliation of every change against a snapshot, classified as
//!   created, updated or removed
//! - Watch maintenance as directories appear and disappear
//!
//! ```no_run
//! use treewatch::{TreeEvent, TreeWatcher, WatcherConfig};
//!
//! # async fn example() -> treewatch::Result<()> {
//! let mut watcher = TreeWatcher::new(WatcherConfig::new("./src"))?;
//! let mut events = watcher.subscribe();
//! watcher.initialize().await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TreeEvent::Changed { path, is_new, .. } => println!("{path} (new: {is_new})"),
//!         TreeEvent::Removed { path, .. } => println!("{path} removed"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod debounce;
pub mod error;
pub mod event;
pub mod filter;
pub mod ignore;
pub mod platform;
mod recurse;
mod reconcile;
mod watch_table;

pub use config::WatcherConfig;
pub use error::{Result, WatchError};
pub use event::{EventStream, TreeEvent};
pub use filter::{filter_fn, AcceptAll, AllOf, Filter};
pub use ignore::{IgnoreConfig, IgnoreFilter};
pub use platform::{FileSystem, HostFs, NativeEventKind, NotifyBackend, WatchBackend, WatchHandle};
pub use treewatch_core::{EntryKind, RelPath, Snapshot, StatRecord};

use event::EventHub;
use parking_lot::RwLock;
use reconcile::{Command, Reconciler};
use recurse::{Recursor, WalkMode};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use watch_table::WatchTable;

enum Lifecycle {
    Created,
    /// `initialize` was attempted and failed
    Failed,
    /// Initialized with watching disabled
    Enumerated,
    Running {
        commands: mpsc::UnboundedSender<Command>,
        task: JoinHandle<Result<()>>,
    },
    ShutDown,
}

/// Watches a directory tree and reports reconciled changes
///
/// Lifecycle: [`TreeWatcher::new`], optional `with_*` customisation,
/// [`TreeWatcher::initialize`] exactly once, [`TreeWatcher::shutdown`]
/// exactly once. Native notifications that arrive while `initialize` is
/// still walking the tree are buffered and reconciled once it completes.
pub struct TreeWatcher {
    config: WatcherConfig,
    filter: Option<Arc<dyn Filter>>,
    fs: Arc<dyn FileSystem>,
    backend: Option<Arc<dyn WatchBackend>>,
    snapshot: Arc<RwLock<Snapshot>>,
    hub: EventHub,
    state: Lifecycle,
}

impl TreeWatcher {
    /// Create a watcher over the host filesystem
    ///
    /// Fails on invalid configuration. Nothing is touched on disk until
    /// [`TreeWatcher::initialize`].
    pub fn new(config: WatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            filter: None,
            fs: Arc::new(HostFs),
            backend: None,
            snapshot: Arc::default(),
            hub: EventHub::default(),
            state: Lifecycle::Created,
        })
    }

    /// Only track paths `filter` accepts
    ///
    /// Combined with the `[ignore]` rules when those are configured.
    pub fn with_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Stat and list through `fs` instead of the host filesystem
    pub fn with_file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    /// Register native watches through `backend` instead of [`NotifyBackend`]
    pub fn with_backend(mut self, backend: impl WatchBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Receive every event emitted from now on
    ///
    /// The stream ends when the watcher shuts down.
    pub fn subscribe(&self) -> EventStream {
        self.hub.subscribe()
    }

    /// Copy of the snapshot table; available once initialized
    pub fn snapshot(&self) -> Result<Snapshot> {
        match self.state {
            Lifecycle::Created | Lifecycle::Failed => Err(WatchError::NotInitialized),
            _ => Ok(self.snapshot.read().clone()),
        }
    }

    /// True while the reconciliation task is alive
    pub fn is_running(&self) -> bool {
        matches!(&self.state, Lifecycle::Running { task, .. } if !task.is_finished())
    }

    /// Enumerate the tree, register watches and start reconciling
    ///
    /// One-shot: any further call fails with
    /// [`WatchError::AlreadyInitialized`], including after a failed attempt.
    /// Any stat, list, filter or watch failure during the walk aborts it.
    pub async fn initialize(&mut self) -> Result<()> {
        if !matches!(self.state, Lifecycle::Created) {
            return Err(WatchError::AlreadyInitialized);
        }
        self.state = Lifecycle::Failed;

        let root = self
            .fs
            .canonicalize(&self.config.root)
            .await
            .map_err(|source| WatchError::Stat {
                path: self.config.root.clone(),
                source,
            })?;
        let root_stat = self
            .fs
            .stat(&root)
            .await
            .map_err(|source| WatchError::Stat {
                path: root.clone(),
                source,
            })?;
        if !root_stat.is_dir() {
            return Err(WatchError::RootNotDirectory(root));
        }

        let filter = self.resolve_filter(&root)?;
        let backend = if self.config.watch {
            Some(match &self.backend {
                Some(backend) => Arc::clone(backend),
                None => Arc::new(NotifyBackend::new()?) as Arc<dyn WatchBackend>,
            })
        } else {
            None
        };

        let (commands, receiver) = mpsc::unbounded_channel();
        let recursor = Recursor::new(
            root.clone(),
            Arc::clone(&self.fs),
            filter,
            backend,
            commands.clone(),
        );
        let walked = recursor.walk(root.clone(), WalkMode::Strict).await?;

        let mut watches = WatchTable::default();
        for (dir, handle) in walked.watches {
            watches.insert(dir, handle);
        }
        let entries = {
            let mut snapshot = self.snapshot.write();
            snapshot.extend(walked.entries);
            snapshot.len()
        };
        info!(
            root = %root.display(),
            entries,
            watches = watches.len(),
            "initial scan complete"
        );

        self.state = if self.config.watch {
            let debouncer = debounce::Debouncer::new(self.config.debounce(), commands.clone());
            let reconciler = Reconciler::new(
                recursor,
                watches,
                debouncer,
                Arc::clone(&self.snapshot),
                self.hub.clone(),
            );
            Lifecycle::Running {
                commands,
                task: tokio::spawn(reconciler.run(receiver)),
            }
        } else {
            Lifecycle::Enumerated
        };

        Ok(())
    }

    /// Stop watching
    ///
    /// Cancels pending debounce timers, discards queued paths, closes every
    /// watch and ends all event streams. Returns the error that stopped the
    /// reconciliation task early, if any.
    pub async fn shutdown(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, Lifecycle::ShutDown) {
            Lifecycle::Created => {
                self.state = Lifecycle::Created;
                Err(WatchError::NotInitialized)
            }
            Lifecycle::Failed => {
                self.state = Lifecycle::Failed;
                Err(WatchError::NotInitialized)
            }
            Lifecycle::ShutDown => Err(WatchError::AlreadyShutDown),
            Lifecycle::Enumerated => {
                self.hub.close();
                info!("watcher shut down");
                Ok(())
            }
            Lifecycle::Running { commands, task } => {
                // The task may already have stopped on a fatal error
                let _ = commands.send(Command::Shutdown);
                let outcome = task
                    .await
                    .map_err(|e| WatchError::TaskFailed(e.to_string()));
                self.hub.close();
                outcome?
            }
        }
    }

    /// Configured ignore rules and user filter, both required to accept
    fn resolve_filter(&self, root: &Path) -> Result<Arc<dyn Filter>> {
        let ignore = match &self.config.ignore {
            Some(config) => {
                let rules = IgnoreFilter::load(root, config.clone())
                    .map_err(|e| WatchError::Ignore(format!("{e:#}")))?;
                Some(Arc::new(rules) as Arc<dyn Filter>)
            }
            None => None,
        };

        Ok(match (ignore, self.filter.clone()) {
            (Some(ignore), Some(user)) => Arc::new(AllOf::new(vec![ignore, user])),
            (Some(filter), None) | (None, Some(filter)) => filter,
            (None, None) => Arc::new(AcceptAll),
        })
    }
}

impl Drop for TreeWatcher {
    fn drop(&mut self) {
        if let Lifecycle::Running { commands, .. } = &self.state {
            let _ = commands.send(Command::Shutdown);
        }
    }
}
