//! Ports: the trait boundaries between pure domain/application logic and
//! infrastructure. Every component in spec §2's dependency table has a
//! corresponding trait here; `gridbase-providers` and
//! `gridbase-infrastructure` supply the concrete implementations,
//! `gridbase-application` consumes them as `Arc<dyn Trait>`.

pub mod calculation_engine;
pub mod cache;
pub mod dependency_graph;
pub mod event_bus;
pub mod field_kernel;
pub mod link_engine;
pub mod metadata_store;
pub mod metrics;
pub mod pubsub;
pub mod record_store;
pub mod schema_provider;
pub mod transaction;

pub use calculation_engine::{CalculationEngine, EvaluationMode};
pub use cache::CacheProvider;
pub use dependency_graph::{DependencyEdge, DependencyGraphBuilder};
pub use event_bus::{EventBusProvider, TransactionalEventBus};
pub use field_kernel::{FieldKernel, FieldKernelRegistry};
pub use link_engine::LinkEngine;
pub use metadata_store::MetadataStore;
pub use metrics::MetricsProvider;
pub use pubsub::{PubSubBroker, PubSubSubscription};
pub use record_store::{RecordPage, RecordStore};
pub use schema_provider::SchemaProvider;
pub use transaction::{Transaction, TransactionManager};
