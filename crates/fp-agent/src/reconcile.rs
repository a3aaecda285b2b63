//! Expiry-index reconciliation.
//!
//! Ensures the shared collection carries exactly one TTL index on the
//! heartbeat timestamp with the configured expiry. Idempotent and
//! race-tolerant: every instance of the fleet runs this at startup, and a
//! concurrent instance winning the creation race is not an error. Nothing
//! here is ever fatal — a process without a correctly configured index
//! keeps running and merely loses automatic expiry until some instance
//! succeeds.

use crate::store::{PresenceStore, StoreError, UPDATED_AT_FIELD};
use tracing::{debug, error, info, warn};

/// What [`ensure_expiry_index`] did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A matching index already existed; nothing changed.
    Unchanged,
    /// No expiry index existed; one was created.
    Created,
    /// An index with a different expiry was dropped and re-created.
    Replaced,
    /// Creation failed (logged); the collection may be missing the index.
    Failed,
}

/// Reconcile the TTL index on the heartbeat timestamp to `expire_secs`.
///
/// Steps: list existing expiry indexes (a missing collection counts as an
/// empty list); keep a matching index as-is; best-effort drop a mismatched
/// one; create the index otherwise. All failures are logged and swallowed.
pub async fn ensure_expiry_index(store: &dyn PresenceStore, expire_secs: u64) -> ReconcileOutcome {
    let indexes = match store.list_expiry_indexes().await {
        Ok(indexes) => indexes,
        Err(StoreError::CollectionMissing { collection }) => {
            debug!("collection '{collection}' not created yet; assuming no indexes");
            Vec::new()
        }
        Err(err) => {
            warn!("could not list expiry indexes ({err}); assuming none");
            Vec::new()
        }
    };

    let mut replacing = false;
    for index in indexes.iter().filter(|i| i.key_field == UPDATED_AT_FIELD) {
        if index.expire_after_secs == expire_secs {
            debug!(
                "expiry index '{}' already set to {expire_secs}s, nothing to do",
                index.name
            );
            return ReconcileOutcome::Unchanged;
        }
        // Stale configuration: drop and fall through to creation. A failed
        // drop is logged but does not abort; creation will then fail too
        // and be swallowed the same way.
        warn!(
            "expiry index '{}' configured for {}s, want {expire_secs}s; dropping",
            index.name, index.expire_after_secs
        );
        match store.drop_expiry_index(&index.name).await {
            Ok(true) => replacing = true,
            Ok(false) => debug!("expiry index '{}' vanished before drop", index.name),
            Err(err) => warn!("failed to drop expiry index '{}': {err}", index.name),
        }
    }

    match store.create_expiry_index(expire_secs).await {
        Ok(()) => {
            info!("expiry index on {UPDATED_AT_FIELD} set to {expire_secs}s");
            if replacing {
                ReconcileOutcome::Replaced
            } else {
                ReconcileOutcome::Created
            }
        }
        Err(err) => {
            // Likely a concurrent instance created an equivalent index
            // between our listing and creation. Never fatal.
            error!("error creating expiry index: {err}");
            ReconcileOutcome::Failed
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_missing_collection_creates_index() {
        let store = MemoryStore::new("instances");
        let outcome = ensure_expiry_index(&store, 60).await;
        assert_eq!(outcome, ReconcileOutcome::Created);
        let indexes = store.list_expiry_indexes().await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].expire_after_secs, 60);
    }

    #[tokio::test]
    async fn test_matching_index_left_alone() {
        let store = MemoryStore::new("instances");
        store.create_expiry_index(60).await.unwrap();
        let outcome = ensure_expiry_index(&store, 60).await;
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_mismatched_expiry_is_replaced() {
        let store = MemoryStore::new("instances");
        store.create_expiry_index(120).await.unwrap();
        let outcome = ensure_expiry_index(&store, 60).await;
        assert_eq!(outcome, ReconcileOutcome::Replaced);
        let indexes = store.list_expiry_indexes().await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].expire_after_secs, 60);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = MemoryStore::new("instances");
        assert_eq!(ensure_expiry_index(&store, 60).await, ReconcileOutcome::Created);
        assert_eq!(ensure_expiry_index(&store, 60).await, ReconcileOutcome::Unchanged);
        assert_eq!(ensure_expiry_index(&store, 60).await, ReconcileOutcome::Unchanged);
        assert_eq!(store.list_expiry_indexes().await.unwrap().len(), 1);
    }
}
