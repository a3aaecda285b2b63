//! Presence configuration
//!
//! Read once at process startup; there is no hot reload. Values can come
//! from a `[presence]` section of a TOML config file or from environment
//! variables (env wins only in [`PresenceConfig::from_env`], which is the
//! path hosts without a config file use).

use serde::{Deserialize, Serialize};

/// Environment variable naming the shared presence collection.
pub const ENV_COLLECTION: &str = "PRESENCE_COLLECTION_NAME";
/// Environment variable overriding the heartbeat period, in seconds.
pub const ENV_PING_INTERVAL: &str = "PRESENCE_PING_INTERVAL";
/// Environment variable overriding the record TTL, in seconds.
pub const ENV_EXPIRE: &str = "PRESENCE_EXPIRE";

fn default_collection() -> String {
    "instances".to_string()
}

fn default_ping_interval() -> u64 {
    10
}

/// Presence registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Name of the shared collection holding instance records.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Heartbeat period in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Record TTL in seconds. When unset, derived from the ping interval
    /// (see [`PresenceConfig::effective_expire_secs`]). Should exceed twice
    /// the ping interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_secs: Option<u64>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            ping_interval_secs: default_ping_interval(),
            expire_secs: None,
        }
    }
}

impl PresenceConfig {
    /// Build a configuration from the `PRESENCE_*` environment variables,
    /// falling back to defaults for absent or unparseable values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(ENV_COLLECTION) {
            if !name.is_empty() {
                config.collection = name;
            }
        }
        if let Some(secs) = read_env_u64(ENV_PING_INTERVAL) {
            config.ping_interval_secs = secs;
        }
        config.expire_secs = read_env_u64(ENV_EXPIRE);
        config
    }

    /// Parse a configuration from a TOML document, applying field defaults
    /// for anything absent.
    pub fn from_toml_str(doc: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(doc)
    }

    /// The TTL the expiry index must enforce, in seconds.
    ///
    /// Defaults to the ping interval tripled and rounded up to a whole
    /// minute, guaranteeing at least three missed heartbeats before a
    /// record expires.
    pub fn effective_expire_secs(&self) -> u64 {
        self.expire_secs
            .unwrap_or_else(|| (self.ping_interval_secs * 3).div_ceil(60) * 60)
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
