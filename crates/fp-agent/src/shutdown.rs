//! Graceful unregistration on process termination.
//!
//! The hook is deliberately decoupled from OS signal handling: the host
//! supervisor obtains a [`ShutdownHook`] and invokes
//! [`ShutdownHook::engage`] from its own termination path, awaiting clean
//! record removal before letting the process exit. The hook arms when the
//! agent registers and disarms once unregistration completes, so engaging
//! twice (or after a manual unregister) does nothing.

use crate::agent::PresenceAgent;
use anyhow::Result;
use std::sync::Weak;
use tracing::{debug, info, warn};

/// Host-invoked termination hook for one [`PresenceAgent`].
///
/// Holds only a weak agent reference: keeping the hook alive never keeps
/// the agent (or its heartbeat task) alive.
#[derive(Debug, Clone)]
pub struct ShutdownHook {
    agent: Weak<PresenceAgent>,
}

impl ShutdownHook {
    pub(crate) fn new(agent: Weak<PresenceAgent>) -> Self {
        Self { agent }
    }

    /// Unregister the agent and wait for completion, if the hook is armed.
    ///
    /// No-op when the hook is disarmed (the agent never registered, or
    /// already unregistered) or the agent has been dropped.
    ///
    /// # Errors
    ///
    /// Propagates the unregistration's store failure; the host decides
    /// whether to retry or exit anyway.
    pub async fn engage(&self) -> Result<()> {
        let Some(agent) = self.agent.upgrade() else {
            debug!("shutdown hook engaged after agent was dropped; nothing to do");
            return Ok(());
        };
        if !agent.hook_armed().await {
            debug!("shutdown hook engaged while disarmed; nothing to do");
            return Ok(());
        }

        match agent.unregister().await {
            Ok(_) => {
                info!("presence record removed before exit");
                Ok(())
            }
            Err(err) => {
                warn!("shutdown unregistration failed: {err}");
                Err(err.into())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
