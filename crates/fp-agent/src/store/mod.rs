//! Store abstraction over the shared presence collection.
//!
//! The real backend (a document store with TTL indexes and a change feed)
//! is an external collaborator; this module defines the seam the agent
//! consumes. Every write an agent performs is keyed by its own identity, so
//! cross-instance write conflicts cannot occur — instances interact only
//! through reads, the change feed, and the store's TTL-driven deletions.
//!
//! [`MemoryStore`] is the in-crate reference backend, used by the test
//! suite and suitable for single-host deployments.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use fleet_presence_core::{InstanceId, InstanceRecord};
use serde_json::Value;
use tokio::sync::broadcast;

/// Stored name of the heartbeat timestamp field the expiry index keys on.
pub const UPDATED_AT_FIELD: &str = "_updatedAt";

/// Fields written by a registration upsert.
///
/// `created_at`/`updated_at` are assigned by the store: `updated_at` on
/// every upsert, `created_at` on insert only.
#[derive(Debug, Clone)]
pub struct RegistrationFields {
    /// OS process id of the registering process.
    pub pid: u32,
    /// Caller-supplied logical name.
    pub name: String,
    /// Caller-supplied metadata; stored only when present.
    pub extra_information: Option<Value>,
}

/// A TTL index as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryIndex {
    /// Store-assigned index name, used for drops.
    pub name: String,
    /// Field the index is keyed on (ascending).
    pub key_field: String,
    /// Seconds of staleness after which the store deletes a record.
    pub expire_after_secs: u64,
}

/// One entry of the store-level membership feed.
///
/// The feed reports *that* a record appeared or vanished, never *why*:
/// explicit unregistration and TTL expiry both surface as
/// [`MembershipChange::Removed`].
#[derive(Debug, Clone)]
pub enum MembershipChange {
    /// A record newly appeared (registration, or re-registration after loss).
    Added(InstanceRecord),
    /// A record disappeared (unregistration or TTL expiry, indistinguishably).
    Removed(InstanceRecord),
}

/// Error from any store-facing operation.
///
/// Always returned as a value; store failures never abort the process.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The collection has not been created yet. Index listing treats this
    /// as "no indexes" rather than a failure.
    #[error("collection '{collection}' does not exist yet")]
    CollectionMissing { collection: String },

    /// Any other backend failure (store unavailable, query rejected, ...).
    #[error("store operation failed: {message}")]
    Backend { message: String },
}

/// Async seam over the shared presence collection.
///
/// All operations are non-blocking and may suspend until the store
/// responds. Implementations must preserve set-on-insert semantics for
/// `created_at` in [`upsert`](PresenceStore::upsert): an update of an
/// existing record never rewrites it.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Insert-or-update the record keyed by `id`, refreshing `updated_at`
    /// and setting `created_at` only on insert. Returns the resulting
    /// record.
    async fn upsert(
        &self,
        id: InstanceId,
        fields: RegistrationFields,
    ) -> Result<InstanceRecord, StoreError>;

    /// Refresh `updated_at` for the record keyed by `id`, if it exists.
    /// Returns the number of matched records (0 or 1); zero means the
    /// registration was lost.
    async fn touch(&self, id: InstanceId) -> Result<u64, StoreError>;

    /// Delete the record keyed by `id`. Returns the number of records
    /// removed (0 or 1); removing an absent record is not an error.
    async fn remove(&self, id: InstanceId) -> Result<u64, StoreError>;

    /// Fetch the record keyed by `id`.
    async fn find(&self, id: InstanceId) -> Result<Option<InstanceRecord>, StoreError>;

    /// Enumerate all records currently in the collection.
    async fn list(&self) -> Result<Vec<InstanceRecord>, StoreError>;

    /// Subscribe to the membership feed. Slow subscribers may lose entries
    /// (broadcast semantics); the feed is a notification stream, not a log.
    fn watch(&self) -> broadcast::Receiver<MembershipChange>;

    /// List TTL indexes configured on the collection.
    async fn list_expiry_indexes(&self) -> Result<Vec<ExpiryIndex>, StoreError>;

    /// Drop the index named `name`. Returns `false` when no such index
    /// exists.
    async fn drop_expiry_index(&self, name: &str) -> Result<bool, StoreError>;

    /// Create an ascending TTL index on [`UPDATED_AT_FIELD`] expiring
    /// records after `expire_after_secs` of staleness.
    async fn create_expiry_index(&self, expire_after_secs: u64) -> Result<(), StoreError>;
}
