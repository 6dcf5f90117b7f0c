//! Reconciliation of debounced paths against the snapshot
//!
//! One task owns the reconciler: it receives native notifications and timer
//! expiries as [`Command`]s, keeps the pending queue, and drains it one path
//! at a time. Because only this task ever drains, reconciliation is
//! single-flight by construction. Commands that arrive while a drain is in
//! progress are absorbed between entries, so newly expired paths join the
//! running drain instead of starting another.

use crate::debounce::Debouncer;
use crate::error::Result;
use crate::event::{EventHub, TreeEvent};
use crate::platform::NativeEventKind;
use crate::recurse::{Recursor, WalkMode};
use crate::watch_table::WatchTable;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use treewatch_core::{RelPath, Snapshot, StatRecord};

/// Input to the reconciliation task
#[derive(Debug)]
pub(crate) enum Command {
    /// A native watch on `dir` reported `child`
    Native {
        dir: PathBuf,
        child: OsString,
        kind: NativeEventKind,
    },
    /// Debounce timer `id` for `path` ran out
    Expired { path: PathBuf, id: u64 },
    /// Stop: cancel timers, discard the queue, close every watch
    Shutdown,
}

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct Reconciler {
    recursor: Recursor,
    watches: WatchTable,
    debouncer: Debouncer,
    snapshot: Arc<RwLock<Snapshot>>,
    hub: EventHub,
    /// Absolute paths awaiting reconciliation, oldest first
    queue: VecDeque<PathBuf>,
}

impl Reconciler {
    pub(crate) fn new(
        recursor: Recursor,
        watches: WatchTable,
        debouncer: Debouncer,
        snapshot: Arc<RwLock<Snapshot>>,
        hub: EventHub,
    ) -> Self {
        Self {
            recursor,
            watches,
            debouncer,
            snapshot,
            hub,
            queue: VecDeque::new(),
        }
    }

    /// Serve commands until shutdown or a fatal error, then tear down
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> Result<()> {
        let result = self.serve(&mut commands).await;
        if let Err(ref e) = result {
            error!(error = %e, "reconciliation stopped");
        }
        self.teardown();
        result
    }

    async fn serve(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> Result<()> {
        while let Some(command) = commands.recv().await {
            if let Flow::Stop = self.handle(command) {
                return Ok(());
            }

            while let Some(full) = self.queue.pop_front() {
                self.reconcile(full).await?;

                while let Ok(command) = commands.try_recv() {
                    if let Flow::Stop = self.handle(command) {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Native { dir, child, kind } => {
                let path = dir.join(child);
                trace!(path = %path.display(), ?kind, "native event");
                self.debouncer.schedule(path);
                trace!(pending = self.debouncer.outstanding(), "debounce scheduled");
            }
            Command::Expired { path, id } => {
                if self.debouncer.expire(&path, id) {
                    self.queue.push_back(path);
                }
            }
            Command::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    /// Re-stat one path and bring the tables in line with it
    async fn reconcile(&mut self, full: PathBuf) -> Result<()> {
        let Some(rel) = self.recursor.relative(&full) else {
            return Ok(());
        };

        // Every stat failure means the path is gone, whatever the cause
        match self.recursor.fs().stat(&full).await {
            Ok(stat) => self.refresh(full, rel, stat).await,
            Err(e) => {
                trace!(path = %rel, error = %e, "stat failed");
                self.forget(&rel);
                Ok(())
            }
        }
    }

    /// The path exists: record it and report it as new or changed
    async fn refresh(&mut self, full: PathBuf, rel: RelPath, stat: StatRecord) -> Result<()> {
        match self.recursor.filter().accept(&rel, &stat).await {
            Ok(true) => {}
            Ok(false) => {
                trace!(path = %rel, "filtered out");
                return Ok(());
            }
            Err(e) => {
                warn!(path = %rel, error = %e, "filter failed; skipping path");
                return Ok(());
            }
        }

        let was_dir = self.snapshot.read().get(&rel).is_some_and(StatRecord::is_dir);
        if !stat.is_dir() && (was_dir || self.watches.covers(&rel)) {
            // Directory replaced by a file or link under the same name
            self.forget_subtree(&rel);
        }

        if stat.is_dir() && !self.watches.contains(&rel) {
            return self.discover(full, rel).await;
        }

        self.record(rel, stat);
        Ok(())
    }

    /// Store `stat` and report it as new or changed
    fn record(&mut self, path: RelPath, stat: StatRecord) {
        let is_new = self
            .snapshot
            .write()
            .insert(path.clone(), stat.clone())
            .is_none();
        self.emit(TreeEvent::Changed { path, stat, is_new });
    }

    /// The path is gone: drop it, and its subtree if it was a directory
    fn forget(&mut self, rel: &RelPath) {
        let removed = self.snapshot.write().remove(rel);
        let was_dir = removed.as_ref().is_some_and(StatRecord::is_dir);
        let watched = self.watches.covers(rel);

        match removed {
            Some(stat) => self.emit(TreeEvent::Removed {
                path: rel.clone(),
                stat,
            }),
            None if !watched => {
                trace!(path = %rel, "already reconciled away");
                return;
            }
            None => {}
        }

        if was_dir || watched {
            self.forget_subtree(rel);
        }
    }

    /// Close watches on and beneath `dir`, drop and report its descendants
    fn forget_subtree(&mut self, dir: &RelPath) {
        let closed = self.watches.close_subtree(dir);
        let removed = self.snapshot.write().remove_subtree(dir);
        debug!(path = %dir, closed, removed = removed.len(), "dropped subtree");

        for (path, stat) in removed {
            self.emit(TreeEvent::Removed { path, stat });
        }
    }

    /// Enumerate a directory that just appeared and report it with its
    /// contents
    ///
    /// Paths inside that cannot be read are left out. A directory that cannot
    /// itself be entered is neither recorded nor reported.
    async fn discover(&mut self, full: PathBuf, dir: RelPath) -> Result<()> {
        let mut walked = self.recursor.walk(full, WalkMode::Lenient).await?;

        if walked.entries.first().map(|(path, _)| path) != Some(&dir) {
            debug!(path = %dir, "could not enter new directory");
            self.forget(&dir);
            return Ok(());
        }

        let watches = walked.watches.len();
        for (key, handle) in walked.watches {
            self.watches.insert(key, handle);
        }
        debug!(path = %dir, watches, entries = walked.entries.len(), "entered new directory");

        walked.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (path, stat) in walked.entries {
            self.record(path, stat);
        }
        Ok(())
    }

    fn emit(&self, event: TreeEvent) {
        match &event {
            TreeEvent::Changed { path, is_new, .. } => debug!(path = %path, is_new, "changed"),
            TreeEvent::Removed { path, .. } => debug!(path = %path, "removed"),
        }
        self.hub.emit(event);
    }

    /// Drain-and-discard: nothing queued or pending survives shutdown
    fn teardown(&mut self) {
        let timers = self.debouncer.cancel_all();
        let queued = self.queue.len();
        self.queue.clear();
        let closed = self.watches.close_all();
        self.hub.close();
        info!(closed, timers, queued, "watcher shut down");
    }
}
