//! Core types for fleet-presence
//!
//! This crate provides the shared building blocks of the presence registry:
//! the persisted [`InstanceRecord`](schema::InstanceRecord) schema, the
//! bind-once [`IdentityProvider`](identity::IdentityProvider), and the
//! [`PresenceConfig`](config::PresenceConfig) read at startup.
//!
//! The record schema is a wire/storage contract: field names (including the
//! presence or absence of `extraInformation`) are preserved exactly so that
//! external tooling can query the shared collection directly.

pub mod config;
pub mod identity;
pub mod logging;
pub mod schema;

pub use config::PresenceConfig;
pub use identity::IdentityProvider;
pub use schema::{InstanceId, InstanceRecord};
