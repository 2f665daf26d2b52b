//! C8 — Event Bus port, spec §4.8.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::RecordEvent;

/// In-process fanout of committed record events to whatever else in
/// this instance cares (the pub/sub bridge, metrics, audit log).
#[async_trait]
pub trait EventBusProvider: Send + Sync {
    /// Broadcast `event` to all current subscribers. Never called
    /// directly by use-case code — only by
    /// [`TransactionalEventBus::commit`], so that a rolled-back
    /// transaction never fans out an event for writes nobody
    /// durably made (spec §4.8's core invariant).
    fn publish(&self, event: RecordEvent);

    /// Subscribe to the event stream.
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RecordEvent>;
}

/// Buffers events raised during a unit of work and only hands them to
/// the underlying [`EventBusProvider`] when the surrounding database
/// transaction actually commits.
#[async_trait]
pub trait TransactionalEventBus: Send + Sync {
    /// Buffer `event` for this unit of work; does not publish yet.
    fn stage(&self, event: RecordEvent);

    /// Publish every staged event, in the order they were staged.
    /// Called once the database transaction has committed.
    async fn commit(&self) -> Result<()>;

    /// Discard every staged event without publishing. Called when the
    /// surrounding transaction rolls back.
    fn rollback(&self);
}
