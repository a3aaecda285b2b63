//! Bind-once process identity.
//!
//! A process has no identity until its startup phase completes; the host
//! calls [`IdentityProvider::bind`] exactly once at that point, and every
//! later [`IdentityProvider::id`] call returns the same value. Registration
//! attempts made before `bind()` are rejected by the agent with a
//! precondition error rather than being queued.

use crate::schema::InstanceId;
use std::sync::OnceLock;

/// Provider of the process's unique, stable identity.
///
/// Cheap to share (`Arc<IdentityProvider>`); all methods take `&self`.
#[derive(Debug, Default)]
pub struct IdentityProvider {
    id: OnceLock<InstanceId>,
}

impl IdentityProvider {
    /// Create a provider with no identity bound yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fresh random identity, if none is bound yet.
    ///
    /// The first call generates and binds a UUIDv4; subsequent calls are
    /// no-ops (first value wins). Returns the bound identity either way.
    pub fn bind(&self) -> InstanceId {
        *self.id.get_or_init(InstanceId::random)
    }

    /// The bound identity, or `None` before startup has completed.
    pub fn id(&self) -> Option<InstanceId> {
        self.id.get().copied()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
