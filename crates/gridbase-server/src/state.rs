//! Shared state for the collaboration router, spec §6: one `AppState`
//! per process, cloned (cheaply, via `Arc`) into every connection task.

use std::sync::Arc;

use gridbase_application::{LinkFieldService, RecordService};
use gridbase_domain::ports::{MetadataStore, MetricsProvider, PubSubBroker, RecordStore};

use crate::auth::AuthVerifier;

/// Everything a connection handler needs: the two use-case services for
/// mutating state, read-only [`RecordStore`]/[`MetadataStore`] access for
/// building subscribe snapshots, the cross-instance [`PubSubBroker`] for
/// fanout, the pluggable [`AuthVerifier`], and an optional [`MetricsProvider`]
/// (C12) that never gates a request if it is absent.
pub struct AppState {
    pub record_service: Arc<RecordService>,
    pub link_field_service: Arc<LinkFieldService>,
    pub records: Arc<dyn RecordStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub pubsub: Arc<dyn PubSubBroker>,
    pub auth: Arc<dyn AuthVerifier>,
    pub metrics: Arc<dyn MetricsProvider>,
}

impl AppState {
    #[must_use]
    pub fn new(
        record_service: Arc<RecordService>,
        link_field_service: Arc<LinkFieldService>,
        records: Arc<dyn RecordStore>,
        metadata: Arc<dyn MetadataStore>,
        pubsub: Arc<dyn PubSubBroker>,
        auth: Arc<dyn AuthVerifier>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        Self {
            record_service,
            link_field_service,
            records,
            metadata,
            pubsub,
            auth,
            metrics,
        }
    }
}
