//! Lifecycle and membership event fan-out.
//!
//! Two distinct channels:
//!
//! - **Lifecycle**: this process's own `registered`/`unregistered`
//!   transitions, published synchronously by the agent. Intended for
//!   host-process integration, not fleet-wide membership.
//! - **Membership**: the store's change feed
//!   ([`PresenceStore::watch`](crate::store::PresenceStore::watch)),
//!   reporting every record that appears or disappears fleet-wide.
//!
//! Both use broadcast semantics: slow subscribers lose entries rather than
//! backpressuring the agent.

use crate::store::{MembershipChange, PresenceStore};
use fleet_presence_core::{InstanceId, InstanceRecord};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle channel buffer.
const LIFECYCLE_CAPACITY: usize = 16;

/// A local lifecycle transition of this process's agent.
#[derive(Debug, Clone)]
pub enum Lifecycle {
    /// The agent registered (or re-registered) its instance record.
    Registered(InstanceRecord),
    /// The agent removed its instance record.
    Unregistered(InstanceId),
}

/// Broadcast bus for [`Lifecycle`] events.
#[derive(Debug)]
pub(crate) struct LifecycleBus {
    tx: broadcast::Sender<Lifecycle>,
}

impl LifecycleBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Lifecycle> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub(crate) fn publish(&self, event: Lifecycle) {
        let _ = self.tx.send(event);
    }
}

/// Spawn a task logging fleet membership changes until cancelled.
///
/// Every appearing record logs a "connected" line and every vanishing one
/// a "disconnected" line; this process's own record is tagged `(me)`.
pub fn spawn_activity_logger(
    store: &dyn PresenceStore,
    my_id: Option<InstanceId>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut feed = store.watch();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                change = feed.recv() => match change {
                    Ok(MembershipChange::Added(record)) => {
                        let me = if Some(record.id) == my_id { " (me)" } else { "" };
                        info!("instance connected: {} - {}{me}", record.name, record.id);
                    }
                    Ok(MembershipChange::Removed(record)) => {
                        info!("instance disconnected: {} - {}", record.name, record.id);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("membership feed lagged; {missed} change(s) not logged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
