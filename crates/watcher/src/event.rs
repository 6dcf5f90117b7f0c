//! Change events and subscriptions

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use treewatch_core::{RelPath, StatRecord};

/// A reconciled change to a tracked path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// The path appeared (`is_new`) or its state was refreshed
    Changed {
        path: RelPath,
        stat: StatRecord,
        is_new: bool,
    },
    /// The path disappeared; `stat` is the last known state
    Removed { path: RelPath, stat: StatRecord },
}

impl TreeEvent {
    pub fn path(&self) -> &RelPath {
        match self {
            TreeEvent::Changed { path, .. } | TreeEvent::Removed { path, .. } => path,
        }
    }

    pub fn stat(&self) -> &StatRecord {
        match self {
            TreeEvent::Changed { stat, .. } | TreeEvent::Removed { stat, .. } => stat,
        }
    }

    /// True for a `Changed` event reporting a path that was not tracked before
    pub fn is_created(&self) -> bool {
        matches!(self, TreeEvent::Changed { is_new: true, .. })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, TreeEvent::Removed { .. })
    }
}

#[derive(Default)]
struct HubState {
    subscribers: Vec<mpsc::UnboundedSender<TreeEvent>>,
    closed: bool,
}

/// Fan-out of events to every live subscriber
#[derive(Clone, Default)]
pub(crate) struct EventHub {
    state: Arc<Mutex<HubState>>,
}

impl EventHub {
    pub(crate) fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        // A closed hub hands out streams that end immediately
        if !state.closed {
            state.subscribers.push(tx);
        }
        EventStream { rx }
    }

    pub(crate) fn emit(&self, event: TreeEvent) {
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// End every stream; later subscriptions end immediately
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscribers.clear();
    }
}

/// Events from one subscription, in emission order
///
/// Ends (`None`) once the watcher shuts down.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<TreeEvent>,
}

impl EventStream {
    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<TreeEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already buffered
    pub fn try_recv(&mut self) -> Option<TreeEvent> {
        self.rx.try_recv().ok()
    }

    /// Every event buffered right now
    pub fn drain(&mut self) -> Vec<TreeEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl Stream for EventStream {
    type Item = TreeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TreeEvent>> {
        self.rx.poll_recv(cx)
    }
}
