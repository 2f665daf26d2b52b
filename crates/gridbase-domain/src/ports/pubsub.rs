//! C9 — Pub/Sub Broker port, spec §4.9.

use async_trait::async_trait;

use crate::error::Result;

/// Cross-instance broadcast of ShareDB-style operations over Redis
/// pub/sub, channel-named `sharedb:rec_<table_id>.<record_id>` (spec
/// §4.9). Distinct from [`crate::ports::EventBusProvider`], which is
/// in-process only — SPEC_FULL §4.9 keeps the two paths separate
/// rather than converging them onto one broadcast primitive.
#[async_trait]
pub trait PubSubBroker: Send + Sync {
    /// Publish a raw, already-serialized ShareDB wire message to
    /// `channel`.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()>;

    /// Subscribe to `channel`, receiving every message published to
    /// it from any instance (including this one).
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn PubSubSubscription>>;
}

/// An open subscription to one channel.
#[async_trait]
pub trait PubSubSubscription: Send {
    /// Wait for the next message, or `Ok(None)` if the subscription
    /// was closed.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;

    /// Stop receiving on this channel.
    async fn unsubscribe(&mut self) -> Result<()>;
}
