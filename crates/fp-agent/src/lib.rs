//! Presence agent for fleet-presence
//!
//! Implements the presence/heartbeat protocol on top of a shared,
//! change-observable store: a process registers an instance record keyed by
//! its bind-once identity, refreshes the record's `_updatedAt` on a periodic
//! heartbeat, and relies on the store's TTL index to reap records whose
//! owner stopped heartbeating. A heartbeat that matches zero records means
//! the registration was lost (TTL expiry or external removal — the two are
//! indistinguishable) and the agent transparently re-registers.
//!
//! ## Pieces
//!
//! - [`store::PresenceStore`] — async seam over the shared collection; the
//!   in-memory [`store::MemoryStore`] ships as a reference backend.
//! - [`reconcile::ensure_expiry_index`] — idempotent, race-tolerant TTL
//!   index reconciliation, never fatal to startup.
//! - [`agent::PresenceAgent`] — registration/unregistration/heartbeat state
//!   machine, one per process.
//! - [`events`] — lifecycle broadcast for this process's own transitions
//!   plus the store-level membership feed.
//! - [`shutdown::ShutdownHook`] — host-invoked graceful unregistration.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fleet_presence_agent::agent::PresenceAgent;
//! use fleet_presence_agent::reconcile::ensure_expiry_index;
//! use fleet_presence_agent::store::MemoryStore;
//! use fleet_presence_core::{IdentityProvider, PresenceConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = PresenceConfig::default();
//! let store = Arc::new(MemoryStore::new(&config.collection));
//! let identity = Arc::new(IdentityProvider::new());
//! identity.bind(); // startup complete
//!
//! ensure_expiry_index(store.as_ref(), config.effective_expire_secs()).await;
//!
//! let agent = PresenceAgent::new(store, identity, config);
//! let record = agent.register("worker-1", None).await.unwrap();
//! assert_eq!(record.name, "worker-1");
//! agent.unregister().await.unwrap();
//! # }
//! ```

pub mod agent;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod reconcile;
pub mod shutdown;
pub mod store;

pub use agent::{PingOutcome, PresenceAgent};
pub use error::PresenceError;
pub use events::Lifecycle;
pub use reconcile::{ensure_expiry_index, ReconcileOutcome};
pub use shutdown::ShutdownHook;
pub use store::{MembershipChange, MemoryStore, PresenceStore, StoreError};
