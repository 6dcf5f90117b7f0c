//! Recursive enumeration of a directory tree
//!
//! Stats every path, applies the filter, records what passes and registers a
//! native watch on every accepted directory. Children of a directory are
//! walked concurrently; each child returns its own results and the parent
//! merges them once all children are done, so no table is shared during the
//! walk.

use crate::error::{Result, WatchError};
use crate::filter::Filter;
use crate::platform::{FileSystem, NativeCallback, NativeEventKind, WatchBackend, WatchHandle};
use crate::reconcile::Command;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{trace, warn};
use treewatch_core::{RelPath, StatRecord};

/// Everything found beneath one walked path
#[derive(Default)]
pub(crate) struct Walked {
    /// Accepted entries (never the root)
    pub(crate) entries: Vec<(RelPath, StatRecord)>,
    /// Watches registered on accepted directories; `None` is the root
    pub(crate) watches: Vec<(Option<RelPath>, Box<dyn WatchHandle>)>,
}

impl Walked {
    fn merge(&mut self, other: Walked) {
        self.entries.extend(other.entries);
        self.watches.extend(other.watches);
    }
}

/// How a walk treats paths it cannot read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WalkMode {
    /// Any failure fails the walk
    Strict,
    /// Unreadable paths are left out
    Lenient,
}

/// Result of a failure on one path in `mode`
fn left_out(mode: WalkMode, err: WatchError) -> Result<Walked> {
    if mode == WalkMode::Strict || err.is_fatal() {
        return Err(err);
    }
    match &err {
        // Gone between the parent's listing and the stat
        WatchError::Stat { .. } => trace!(error = %err, "vanished during walk"),
        _ => warn!(error = %err, "leaving out unreadable path"),
    }
    Ok(Walked::default())
}

pub(crate) struct Recursor {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    filter: Arc<dyn Filter>,
    /// `None` when watching is disabled
    backend: Option<Arc<dyn WatchBackend>>,
    /// Native notifications are forwarded here
    commands: mpsc::UnboundedSender<Command>,
}

impl Recursor {
    pub(crate) fn new(
        root: PathBuf,
        fs: Arc<dyn FileSystem>,
        filter: Arc<dyn Filter>,
        backend: Option<Arc<dyn WatchBackend>>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            root,
            fs,
            filter,
            backend,
            commands,
        }
    }

    pub(crate) fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub(crate) fn filter(&self) -> &dyn Filter {
        self.filter.as_ref()
    }

    /// Walk `full` and everything beneath it
    ///
    /// In [`WalkMode::Strict`] any stat, list, filter or watch failure fails
    /// the whole walk. In [`WalkMode::Lenient`] a path that cannot be read is
    /// left out along with its subtree and only fatal errors fail the walk.
    /// Either way, watches registered on paths that end up left out are
    /// closed when their handles drop.
    pub(crate) fn walk(&self, full: PathBuf, mode: WalkMode) -> BoxFuture<'_, Result<Walked>> {
        async move {
            let rel = if full == self.root {
                None
            } else {
                match self.relative(&full) {
                    Some(rel) => Some(rel),
                    None => return Ok(Walked::default()),
                }
            };

            let stat = match self.fs.stat(&full).await {
                Ok(stat) => stat,
                Err(source) => {
                    return left_out(mode, WatchError::Stat { path: full, source });
                }
            };

            let mut walked = Walked::default();
            if let Some(rel) = &rel {
                match self.filter.accept(rel, &stat).await {
                    Ok(true) => {}
                    Ok(false) => {
                        trace!(path = %rel, "filtered out");
                        return Ok(walked);
                    }
                    Err(e) => {
                        let err = WatchError::Filter {
                            path: rel.clone(),
                            source: e.into(),
                        };
                        return left_out(mode, err);
                    }
                }
                walked.entries.push((rel.clone(), stat.clone()));
            }

            if !stat.is_dir() {
                return Ok(walked);
            }

            if let Some(backend) = &self.backend {
                match backend.watch(&full, self.callback_for(&full)) {
                    Ok(handle) => walked.watches.push((rel, handle)),
                    Err(e) => return left_out(mode, e),
                }
            }

            let names = match self.fs.list(&full).await {
                Ok(names) => names,
                Err(source) => {
                    return left_out(mode, WatchError::List { path: full, source });
                }
            };

            let children = try_join_all(
                names
                    .into_iter()
                    .map(|name| self.walk(full.join(name), mode)),
            )
            .await?;
            for child in children {
                walked.merge(child);
            }

            Ok(walked)
        }
        .boxed()
    }

    /// Tree-relative form of `full`, warning when it has none
    ///
    /// Only the root itself and names that are not valid UTF-8 lack one.
    pub(crate) fn relative(&self, full: &Path) -> Option<RelPath> {
        let rel = RelPath::from_full(&self.root, full);
        if rel.is_none() && full != self.root {
            warn!(path = %full.display(), "skipping path without a UTF-8 name below the root");
        }
        rel
    }

    /// Callback forwarding `dir`'s native notifications to the reconciler
    fn callback_for(&self, dir: &Path) -> NativeCallback {
        let dir = dir.to_path_buf();
        let commands = self.commands.clone();
        Arc::new(move |kind: NativeEventKind, child: &OsStr| {
            let _ = commands.send(Command::Native {
                dir: dir.clone(),
                child: child.to_os_string(),
                kind,
            });
        })
    }
}
