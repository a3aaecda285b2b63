//! Registration/heartbeat state machine.
//!
//! One [`PresenceAgent`] per process, constructed with an injected store
//! client and identity provider — no module-level globals. The agent is
//! either `Unregistered` or `Registered`; a registration upsert in flight
//! is not separately observable.
//!
//! ## Self-healing
//!
//! Each heartbeat refreshes the record's `_updatedAt` with a conditional
//! update keyed on this process's identity. A zero-match result means the
//! record vanished — TTL expiry and removal by another actor look
//! identical, deliberately — and the agent transparently re-registers with
//! the last-known name and metadata, starting a new registration epoch
//! (fresh `_createdAt`).

use crate::error::PresenceError;
use crate::events::{Lifecycle, LifecycleBus};
use crate::heartbeat::HeartbeatScheduler;
use crate::shutdown::ShutdownHook;
use crate::store::{MembershipChange, PresenceStore, RegistrationFields};
use fleet_presence_core::{IdentityProvider, InstanceId, InstanceRecord, PresenceConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

/// Result of one heartbeat tick.
#[derive(Debug, Clone)]
pub enum PingOutcome {
    /// The record exists and its `_updatedAt` was refreshed.
    Refreshed,
    /// The record had vanished; the agent re-registered and a new
    /// registration epoch began.
    Reregistered(InstanceRecord),
    /// The agent is not registered; the tick did nothing.
    NotRegistered,
}

/// Last successful registration arguments, kept for self-healing.
#[derive(Debug, Clone)]
struct Registration {
    name: String,
    extra_information: Option<Value>,
}

#[derive(Debug, Default)]
struct AgentState {
    registration: Option<Registration>,
    heartbeat: HeartbeatScheduler,
    hook_armed: bool,
}

/// Presence agent for this process.
///
/// Construct once via [`PresenceAgent::new`] and share the returned `Arc`.
/// All operations report store failures as returned errors; none of them
/// panic or abort the process.
pub struct PresenceAgent {
    store: Arc<dyn PresenceStore>,
    identity: Arc<IdentityProvider>,
    config: PresenceConfig,
    lifecycle: LifecycleBus,
    state: Mutex<AgentState>,
}

impl PresenceAgent {
    /// Create an agent over `store` using `identity` for self-keyed writes.
    pub fn new(
        store: Arc<dyn PresenceStore>,
        identity: Arc<IdentityProvider>,
        config: PresenceConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            identity,
            config,
            lifecycle: LifecycleBus::new(),
            state: Mutex::new(AgentState::default()),
        })
    }

    /// This process's identity, or `None` before startup completes.
    pub fn id(&self) -> Option<InstanceId> {
        self.identity.id()
    }

    /// Handle to the underlying collection, for ad-hoc queries such as
    /// enumerating all live instances.
    pub fn store(&self) -> &Arc<dyn PresenceStore> {
        &self.store
    }

    /// Configuration the agent was built with.
    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Subscribe to this process's own `registered`/`unregistered` events.
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// Subscribe to the fleet-wide membership feed.
    pub fn watch_membership(&self) -> broadcast::Receiver<MembershipChange> {
        self.store.watch()
    }

    /// Whether the agent currently holds a registration.
    pub async fn registered(&self) -> bool {
        self.state.lock().await.registration.is_some()
    }

    /// Whether a heartbeat timer is currently active.
    pub async fn heartbeat_running(&self) -> bool {
        self.state.lock().await.heartbeat.is_running()
    }

    /// A host-invoked hook that unregisters this agent on termination.
    pub fn shutdown_hook(self: &Arc<Self>) -> ShutdownHook {
        ShutdownHook::new(Arc::downgrade(self))
    }

    pub(crate) async fn hook_armed(&self) -> bool {
        self.state.lock().await.hook_armed
    }

    /// Register this instance under `name`, start the heartbeat, publish
    /// [`Lifecycle::Registered`], and arm the shutdown hook.
    ///
    /// Idempotent: registering while already registered re-upserts the
    /// record and restarts the heartbeat timer.
    ///
    /// # Errors
    ///
    /// [`PresenceError::PreconditionNotMet`] before the identity is bound
    /// (no state change; call again after startup). Store failures come
    /// back as [`PresenceError::Store`] with state unchanged.
    pub async fn register(
        self: &Arc<Self>,
        name: &str,
        extra_information: Option<Value>,
    ) -> Result<InstanceRecord, PresenceError> {
        let Some(id) = self.identity.id() else {
            error!("register called before an instance identity was bound");
            return Err(PresenceError::PreconditionNotMet);
        };

        let record = self
            .store
            .upsert(
                id,
                RegistrationFields {
                    pid: std::process::id(),
                    name: name.to_string(),
                    extra_information: extra_information.clone(),
                },
            )
            .await?;

        {
            let mut state = self.state.lock().await;
            state.registration = Some(Registration {
                name: name.to_string(),
                extra_information,
            });
            state
                .heartbeat
                .start(self.ping_period(None), Arc::downgrade(self));
            state.hook_armed = true;
        }

        self.lifecycle.publish(Lifecycle::Registered(record.clone()));
        info!("registered instance '{}' as {}", record.name, record.id);
        Ok(record)
    }

    /// Remove this instance's record, publish [`Lifecycle::Unregistered`],
    /// disarm the shutdown hook, and stop the heartbeat.
    ///
    /// Safe to call when already unregistered: the delete matches nothing
    /// and `Ok(0)` is returned. The timer stop is deliberately the last
    /// sub-step, so no tick can fire after unregistration completes.
    ///
    /// # Errors
    ///
    /// Store failures come back as [`PresenceError::Store`] with the
    /// registration state unchanged; the caller may retry.
    pub async fn unregister(&self) -> Result<u64, PresenceError> {
        let Some(id) = self.identity.id() else {
            return Ok(0);
        };

        let removed = self.store.remove(id).await?;

        let mut state = self.state.lock().await;
        state.registration = None;
        state.hook_armed = false;
        self.lifecycle.publish(Lifecycle::Unregistered(id));
        state.heartbeat.stop();
        drop(state);

        info!("unregistered instance {id}");
        Ok(removed)
    }

    /// Refresh this instance's liveness timestamp.
    ///
    /// Invoked by the heartbeat timer; harmless to call directly. A
    /// zero-match update means the registration was lost (expired or
    /// externally removed) and triggers exactly one re-registration with
    /// the last-known name and metadata.
    pub async fn ping(self: &Arc<Self>) -> Result<PingOutcome, PresenceError> {
        let Some(id) = self.identity.id() else {
            return Ok(PingOutcome::NotRegistered);
        };
        let registration = self.state.lock().await.registration.clone();
        let Some(registration) = registration else {
            return Ok(PingOutcome::NotRegistered);
        };

        if self.store.touch(id).await? > 0 {
            return Ok(PingOutcome::Refreshed);
        }

        debug!("presence record for {id} vanished; re-registering");
        let record = self
            .register(&registration.name, registration.extra_information)
            .await?;
        Ok(PingOutcome::Reregistered(record))
    }

    /// Start (or restart) the heartbeat timer.
    ///
    /// `period` falls back to the configured ping interval. Starting while
    /// a timer runs replaces it; timers never stack.
    pub async fn start_heartbeat(self: &Arc<Self>, period: Option<Duration>) {
        let mut state = self.state.lock().await;
        state
            .heartbeat
            .start(self.ping_period(period), Arc::downgrade(self));
    }

    /// Stop the heartbeat timer. Idempotent; an in-flight ping is not
    /// aborted, but no further tick will fire.
    pub async fn stop_heartbeat(&self) {
        self.state.lock().await.heartbeat.stop();
    }

    fn ping_period(&self, period: Option<Duration>) -> Duration {
        period.unwrap_or_else(|| Duration::from_secs(self.config.ping_interval_secs))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
