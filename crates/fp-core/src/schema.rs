//! Persisted instance record schema.
//!
//! One [`InstanceRecord`] exists per live process instance in the shared
//! presence collection. The serialized field names are a storage contract:
//! other tooling reads the collection directly, so renames here are breaking
//! changes. `extraInformation` is omitted entirely (not serialized as null)
//! when the caller supplied no metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique, stable identity of one process instance.
///
/// Generated once per process lifetime (UUIDv4, 122 random bits) by the
/// [`IdentityProvider`](crate::identity::IdentityProvider). Serialized as a
/// plain string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Generate a fresh random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One live instance, as stored in the shared presence collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Primary key; assigned once at startup, stable for the process lifetime.
    #[serde(rename = "_id")]
    pub id: InstanceId,

    /// OS process id at registration time.
    pub pid: u32,

    /// Caller-supplied logical name (e.g. `"worker-1"`).
    pub name: String,

    /// Caller-supplied structured metadata. Omitted from the stored document
    /// when not provided.
    #[serde(
        rename = "extraInformation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extra_information: Option<Value>,

    /// Set on first insert only; never updated afterwards. A new value for
    /// the same id means the record was deleted and re-created (a new
    /// registration epoch).
    #[serde(rename = "_createdAt")]
    pub created_at: DateTime<Utc>,

    /// Refreshed on every successful heartbeat; drives TTL expiry.
    #[serde(rename = "_updatedAt")]
    pub updated_at: DateTime<Utc>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
