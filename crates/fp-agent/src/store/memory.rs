//! In-memory reference backend for [`PresenceStore`].
//!
//! Backs the test suite and single-host deployments. TTL semantics are
//! provided by [`MemoryStore::sweep_expired`], driven either explicitly
//! (tests) or by the [`MemoryStore::run_sweeper`] background loop. Without
//! a configured expiry index the sweeper removes nothing.

use super::{
    ExpiryIndex, MembershipChange, PresenceStore, RegistrationFields, StoreError,
    UPDATED_AT_FIELD,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fleet_presence_core::{InstanceId, InstanceRecord};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Membership feed buffer; slow subscribers past this lag lose entries.
const FEED_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<InstanceId, InstanceRecord>,
    expiry_index: Option<ExpiryIndex>,
    /// Mirrors a document store: the collection springs into existence on
    /// first write, and index listing fails until then.
    collection_exists: bool,
    /// Number of `touch` calls served, for test instrumentation.
    touches: u64,
}

/// Shared in-memory presence collection with a broadcast change feed.
pub struct MemoryStore {
    collection: String,
    state: Mutex<MemoryState>,
    feed: broadcast::Sender<MembershipChange>,
}

impl MemoryStore {
    /// Create an empty collection named `collection`.
    pub fn new(collection: &str) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            collection: collection.to_string(),
            state: Mutex::new(MemoryState::default()),
            feed,
        }
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Remove every record whose `updated_at` is at least the configured
    /// expiry older than `now`, emitting a feed entry per removal. Returns
    /// the removed records. No-op when no expiry index is configured.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<InstanceRecord> {
        let mut state = self.state.lock().await;
        let Some(expire_secs) = state.expiry_index.as_ref().map(|i| i.expire_after_secs) else {
            return Vec::new();
        };
        // An expiry too large to represent means no record can be stale;
        // the cutoff saturates rather than wrapping.
        let Some(expire) = i64::try_from(expire_secs)
            .ok()
            .and_then(ChronoDuration::try_seconds)
        else {
            return Vec::new();
        };
        let Some(cutoff) = now.checked_sub_signed(expire) else {
            return Vec::new();
        };
        let stale: Vec<InstanceId> = state
            .records
            .values()
            .filter(|r| r.updated_at <= cutoff)
            .map(|r| r.id)
            .collect();
        let mut removed = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some(record) = state.records.remove(&id) {
                let _ = self.feed.send(MembershipChange::Removed(record.clone()));
                removed.push(record);
            }
        }
        if !removed.is_empty() {
            debug!("TTL sweep removed {} stale record(s)", removed.len());
        }
        removed
    }

    /// Run a periodic TTL sweep until cancelled.
    ///
    /// A real document store does this server-side; the in-memory backend
    /// approximates it with a background task in the hosting process.
    pub async fn run_sweeper(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_expired(Utc::now()).await;
                }
                _ = cancel.cancelled() => {
                    debug!("TTL sweeper cancelled");
                    break;
                }
            }
        }
    }

    /// Number of `touch` calls served so far.
    pub async fn touch_count(&self) -> u64 {
        self.state.lock().await.touches
    }
}

#[async_trait]
impl PresenceStore for MemoryStore {
    async fn upsert(
        &self,
        id: InstanceId,
        fields: RegistrationFields,
    ) -> Result<InstanceRecord, StoreError> {
        let mut state = self.state.lock().await;
        state.collection_exists = true;
        let now = Utc::now();
        let record = match state.records.get_mut(&id) {
            Some(existing) => {
                // Update path: created_at is set-on-insert, leave it alone.
                existing.pid = fields.pid;
                existing.name = fields.name;
                existing.extra_information = fields.extra_information;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let record = InstanceRecord {
                    id,
                    pid: fields.pid,
                    name: fields.name,
                    extra_information: fields.extra_information,
                    created_at: now,
                    updated_at: now,
                };
                state.records.insert(id, record.clone());
                let _ = self.feed.send(MembershipChange::Added(record.clone()));
                record
            }
        };
        Ok(record)
    }

    async fn touch(&self, id: InstanceId) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.touches += 1;
        match state.records.get_mut(&id) {
            Some(record) => {
                record.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove(&self, id: InstanceId) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        match state.records.remove(&id) {
            Some(record) => {
                let _ = self.feed.send(MembershipChange::Removed(record));
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find(&self, id: InstanceId) -> Result<Option<InstanceRecord>, StoreError> {
        Ok(self.state.lock().await.records.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<InstanceRecord>, StoreError> {
        Ok(self.state.lock().await.records.values().cloned().collect())
    }

    fn watch(&self) -> broadcast::Receiver<MembershipChange> {
        self.feed.subscribe()
    }

    async fn list_expiry_indexes(&self) -> Result<Vec<ExpiryIndex>, StoreError> {
        let state = self.state.lock().await;
        if !state.collection_exists && state.expiry_index.is_none() {
            return Err(StoreError::CollectionMissing {
                collection: self.collection.clone(),
            });
        }
        Ok(state.expiry_index.iter().cloned().collect())
    }

    async fn drop_expiry_index(&self, name: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.expiry_index.as_ref().is_some_and(|i| i.name == name) {
            state.expiry_index = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn create_expiry_index(&self, expire_after_secs: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.collection_exists = true;
        match &state.expiry_index {
            // Creating an identical index again is allowed (concurrent
            // instances race on startup); differing options are rejected,
            // matching document-store behavior.
            Some(existing) if existing.expire_after_secs == expire_after_secs => Ok(()),
            Some(existing) => Err(StoreError::Backend {
                message: format!(
                    "index '{}' already exists with expireAfterSeconds={}",
                    existing.name, existing.expire_after_secs
                ),
            }),
            None => {
                state.expiry_index = Some(ExpiryIndex {
                    name: format!("{UPDATED_AT_FIELD}_1"),
                    key_field: UPDATED_AT_FIELD.to_string(),
                    expire_after_secs,
                });
                Ok(())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
