//! Periodic heartbeat timer.
//!
//! A single-shot-replaceable timer: starting while a timer is running
//! replaces it rather than stacking, and stopping is idempotent. The loop
//! awaits each ping before taking the next tick, so ticks for one agent
//! never overlap. Cancellation never aborts an in-flight ping; it only
//! prevents further ticks.

use crate::agent::{PingOutcome, PresenceAgent};
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Replace-on-start periodic timer driving [`PresenceAgent::ping`].
///
/// Owned by the agent behind its state mutex; at most one timer is active
/// per agent at any time.
#[derive(Debug, Default)]
pub(crate) struct HeartbeatScheduler {
    active: Option<CancellationToken>,
}

impl HeartbeatScheduler {
    /// Stop any running timer, then schedule pings every `period`.
    ///
    /// The first tick fires one full period after the call. The loop holds
    /// only a `Weak` agent reference and exits on its own once the agent is
    /// dropped.
    pub(crate) fn start(&mut self, period: Duration, agent: Weak<PresenceAgent>) {
        self.stop();
        let cancel = CancellationToken::new();
        tokio::spawn(run_heartbeat_loop(period, agent, cancel.clone()));
        self.active = Some(cancel);
        debug!("heartbeat timer started (period: {period:?})");
    }

    /// Cancel the running timer, if any. Safe to call repeatedly.
    pub(crate) fn stop(&mut self) {
        if let Some(cancel) = self.active.take() {
            cancel.cancel();
            debug!("heartbeat timer stopped");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

async fn run_heartbeat_loop(period: Duration, agent: Weak<PresenceAgent>, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(agent) = agent.upgrade() else { break };
                match agent.ping().await {
                    Ok(PingOutcome::Reregistered(record)) => {
                        info!(
                            "registration for '{}' was lost; re-registered as {}",
                            record.name, record.id
                        );
                    }
                    Ok(_) => {}
                    // A failed tick never propagates; the next tick retries.
                    Err(err) => warn!("heartbeat ping failed: {err}"),
                }
            }
        }
    }
}
