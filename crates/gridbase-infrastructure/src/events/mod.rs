//! In-process event fanout (spec §4.8), grounded on the teacher's
//! `BroadcastEventBus`. This path never crosses instance boundaries —
//! cross-instance fanout to collaboration clients goes through
//! [`crate::pubsub`] instead, per SPEC_FULL §4.9's resolved Open
//! Question.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use gridbase_domain::error::Result;
use gridbase_domain::events::RecordEvent;
use gridbase_domain::ports::{EventBusProvider, TransactionalEventBus};

const EVENT_BUS_BUFFER_SIZE: usize = 1024;

/// In-process broadcast of committed record events, for taps that only
/// care about this instance (metrics, audit logging). Never subscribed
/// to directly by the collaboration server.
pub struct TokioBroadcastEventBus {
    sender: broadcast::Sender<RecordEvent>,
}

impl TokioBroadcastEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_BUFFER_SIZE);
        Self { sender }
    }
}

impl Default for TokioBroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBusProvider for TokioBroadcastEventBus {
    fn publish(&self, event: RecordEvent) {
        match self.sender.send(event) {
            Ok(count) => debug!(subscribers = count, "published record event"),
            Err(_) => debug!("published record event but no subscribers"),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.sender.subscribe()
    }
}

/// Buffers events staged during a unit of work and only publishes them
/// through `inner` once [`commit`](TransactionalEventBus::commit) is
/// called, so a rolled-back write never fans out.
pub struct TransactionalEventBusImpl {
    inner: std::sync::Arc<dyn EventBusProvider>,
    staged: Mutex<Vec<RecordEvent>>,
}

impl TransactionalEventBusImpl {
    #[must_use]
    pub fn new(inner: std::sync::Arc<dyn EventBusProvider>) -> Self {
        Self { inner, staged: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl TransactionalEventBus for TransactionalEventBusImpl {
    fn stage(&self, event: RecordEvent) {
        self.staged.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event);
    }

    async fn commit(&self) -> Result<()> {
        let events = std::mem::take(
            &mut *self.staged.lock().unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        if events.is_empty() {
            warn!("commit called with no staged events");
        }
        for event in events {
            self.inner.publish(event);
        }
        Ok(())
    }

    fn rollback(&self) {
        self.staged.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gridbase_domain::value_objects::{RecordId, TableId};

    use super::*;

    fn sample_event() -> RecordEvent {
        RecordEvent::Delete {
            table_id: TableId::new(),
            record_id: RecordId::new(),
            user_id: "user-1".into(),
            old_version: 1,
        }
    }

    #[tokio::test]
    async fn commit_publishes_staged_events_in_order() {
        let bus = Arc::new(TokioBroadcastEventBus::new());
        let mut rx = bus.subscribe();
        let txn = TransactionalEventBusImpl::new(bus.clone());

        txn.stage(sample_event());
        txn.commit().await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.record_id(), sample_event().record_id());
    }

    #[tokio::test]
    async fn rollback_discards_staged_events() {
        let bus = Arc::new(TokioBroadcastEventBus::new());
        let mut rx = bus.subscribe();
        let txn = TransactionalEventBusImpl::new(bus.clone());

        txn.stage(sample_event());
        txn.rollback();
        txn.commit().await.unwrap();

        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await;
        assert!(outcome.is_err(), "rollback must prevent the staged event from publishing");
    }
}
