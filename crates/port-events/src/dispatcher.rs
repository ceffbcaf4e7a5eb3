//! Per-connector event queues
//!
//! Every connector gets its own FIFO queue and "processing" flag, created on
//! first use and never removed. [`Dispatcher::submit`] appends to the queue
//! and, when no drain is active for that connector, spawns one. A drain
//! hands events to the [`EventHandler`] one at a time until the queue is
//! empty, so a connector never has two handler calls in flight while
//! different connectors drain in parallel.
//!
//! The empty check and the flag reset happen under the connector's lock: an
//! event submitted while a drain is finishing is either seen by that drain
//! or starts a new one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use port_detect::ConnectorId;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::blacklist::Blacklist;
use crate::events::{ConnectorEvent, EventKind};
use crate::handler::EventHandler;

/// What happened to a submitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Connector is blacklisted; nothing was queued
    Blacklisted,
    /// Queued and a new drain was started
    Started,
    /// Queued behind an active drain
    Queued,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<EventKind>,
    processing: bool,
}

#[derive(Debug, Default)]
struct ConnectorQueue {
    state: Mutex<QueueState>,
}

struct DispatcherInner {
    queues: RwLock<HashMap<ConnectorId, Arc<ConnectorQueue>>>,
    blacklist: Blacklist,
    handler: Arc<dyn EventHandler>,
    idle: Notify,
}

/// Routes connector events into per-connector serialized queues
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn EventHandler>, blacklist: Blacklist) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                queues: RwLock::new(HashMap::new()),
                blacklist,
                handler,
                idle: Notify::new(),
            }),
        }
    }

    /// Queue an event for its connector
    ///
    /// Never waits for the handler. Must be called from within a tokio
    /// runtime when the connector has no active drain.
    pub fn submit(&self, kind: EventKind, connector: ConnectorId) -> SubmitOutcome {
        if self.inner.blacklist.contains(&connector) {
            warn!(
                "Connector '{}' event detected on blacklisted connector '{}': no further action will be performed",
                kind.verb(),
                connector
            );
            return SubmitOutcome::Blacklisted;
        }

        let queue = self.queue_for(&connector);
        let start_drain = {
            let mut state = queue.state.lock();
            state.pending.push_back(kind);
            if state.processing {
                false
            } else {
                state.processing = true;
                true
            }
        };

        if start_drain {
            debug!("Queued {} event on '{}', starting drain", kind, connector);
            tokio::spawn(drain(Arc::clone(&self.inner), connector, queue));
            SubmitOutcome::Started
        } else {
            debug!("Queued {} event on '{}', connector busy", kind, connector);
            SubmitOutcome::Queued
        }
    }

    /// Convenience wrapper for a reconciled event
    pub fn submit_event(&self, event: ConnectorEvent) -> SubmitOutcome {
        self.submit(event.kind, event.connector)
    }

    fn queue_for(&self, connector: &ConnectorId) -> Arc<ConnectorQueue> {
        if let Some(queue) = self.inner.queues.read().get(connector) {
            return Arc::clone(queue);
        }
        let mut queues = self.inner.queues.write();
        Arc::clone(queues.entry(connector.clone()).or_default())
    }

    /// Connectors that have received at least one event
    pub fn tracked_connectors(&self) -> Vec<ConnectorId> {
        let mut ids: Vec<_> = self.inner.queues.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Events waiting behind the active handler call
    pub fn pending(&self, connector: &ConnectorId) -> usize {
        self.inner
            .queues
            .read()
            .get(connector)
            .map(|q| q.state.lock().pending.len())
            .unwrap_or(0)
    }

    pub fn is_processing(&self, connector: &ConnectorId) -> bool {
        self.inner
            .queues
            .read()
            .get(connector)
            .map(|q| q.state.lock().processing)
            .unwrap_or(false)
    }

    /// True when no connector has an active drain
    pub fn is_idle(&self) -> bool {
        self.inner
            .queues
            .read()
            .values()
            .all(|q| !q.state.lock().processing)
    }

    /// Wait until every queued event has been handled
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

async fn drain(inner: Arc<DispatcherInner>, connector: ConnectorId, queue: Arc<ConnectorQueue>) {
    loop {
        let next = {
            let mut state = queue.state.lock();
            match state.pending.pop_front() {
                Some(kind) => kind,
                None => {
                    state.processing = false;
                    break;
                }
            }
        };

        // A panicking handler must not leave the connector stuck in "processing"
        let handler = Arc::clone(&inner.handler);
        let id = connector.clone();
        let call = tokio::spawn(async move { handler.handle(next, &id).await });
        if let Err(e) = call.await {
            error!(
                "Handler for {} event on '{}' aborted: {}",
                next, connector, e
            );
        }
    }

    debug!("Queue drained for '{}'", connector);
    inner.idle.notify_waiters();
}
