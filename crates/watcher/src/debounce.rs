//! Per-path debouncing logic
//!
//! Native watches often report one logical change several times (a write can
//! produce both a metadata and a content notification). Each absolute path
//! gets at most one pending timer; a new notification restarts it, and only
//! when it runs out is the path queued for reconciliation.

use crate::reconcile::Command;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

struct PendingTimer {
    id: u64,
    task: JoinHandle<()>,
}

/// Outstanding debounce timers, keyed by absolute path
pub(crate) struct Debouncer {
    delay: Duration,
    timers: AHashMap<PathBuf, PendingTimer>,
    next_id: u64,
    commands: mpsc::UnboundedSender<Command>,
}

impl Debouncer {
    /// Expired timers are reported as [`Command::Expired`] on `commands`
    pub(crate) fn new(delay: Duration, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            delay,
            timers: AHashMap::new(),
            next_id: 0,
            commands,
        }
    }

    /// Start (or restart) the quiet period for `path`
    pub(crate) fn schedule(&mut self, path: PathBuf) {
        self.next_id += 1;
        let id = self.next_id;

        let delay = self.delay;
        let commands = self.commands.clone();
        let timer_path = path.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::Expired {
                path: timer_path,
                id,
            });
        });

        if let Some(previous) = self.timers.insert(path, PendingTimer { id, task }) {
            previous.task.abort();
            trace!(id, replaced = previous.id, "debounce restarted");
        }
    }

    /// Retire the timer `id` for `path`
    ///
    /// Returns false when `id` was superseded or cancelled; its expiry must
    /// then be ignored.
    pub(crate) fn expire(&mut self, path: &Path, id: u64) -> bool {
        match self.timers.get(path) {
            Some(timer) if timer.id == id => {
                self.timers.remove(path);
                true
            }
            _ => {
                trace!(path = %path.display(), id, "stale debounce expiry");
                false
            }
        }
    }

    /// Abort every outstanding timer
    pub(crate) fn cancel_all(&mut self) -> usize {
        let cancelled = self.timers.len();
        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
        cancelled
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.timers.len()
    }
}
