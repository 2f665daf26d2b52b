//! Composition root, spec §2: wires every concrete adapter behind its
//! `gridbase-domain` port and serves the collaboration WebSocket
//! endpoint (`gridbase-server`) on `config.server.bind_addr`.
//!
//! This binary is intentionally thin — everything it calls is already
//! fully specified by a port or a use-case; its only job is
//! construction order and lifetime ownership.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use gridbase_application::{
    CalculationEngineImpl, FieldKernelRegistryImpl, LinkFieldService, PetgraphDependencyGraph,
    RecordService,
};
use gridbase_domain::ports::{
    CalculationEngine, DependencyGraphBuilder, EventBusProvider, FieldKernelRegistry, LinkEngine,
    MetadataStore, MetricsProvider, PubSubBroker, RecordStore, SchemaProvider,
    TransactionManager, TransactionalEventBus,
};
use gridbase_infrastructure::cache::MokaCacheProvider;
use gridbase_infrastructure::events::{TokioBroadcastEventBus, TransactionalEventBusImpl};
use gridbase_infrastructure::logging::{self, LogFormat};
use gridbase_infrastructure::metrics::InMemoryMetricsProvider;
use gridbase_infrastructure::pubsub::RedisPubSubBroker;
use gridbase_infrastructure::{config, db};
use gridbase_providers::{
    ensure_catalog_schema, PostgresLinkEngine, PostgresMetadataStore, PostgresRecordStore,
    PostgresSchemaProvider, PostgresTransactionManager,
};
use gridbase_server::{collaboration_router, AppState, NoopAuthVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging(LogFormat::Pretty, "info")
        .context("failed to initialize logging")?;

    let config = config::load().context("failed to load configuration")?;

    tracing::info!("connecting to database");
    let db = db::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    ensure_catalog_schema(&db)
        .await
        .context("failed to ensure catalog schema")?;

    let cache = Arc::new(MokaCacheProvider::new(
        config.cache.max_capacity,
        Duration::from_secs(config.cache.ttl_secs),
    ));

    let metadata: Arc<dyn MetadataStore> =
        Arc::new(PostgresMetadataStore::new(db.clone(), Some(cache)));
    let schema: Arc<dyn SchemaProvider> = Arc::new(PostgresSchemaProvider::new(db.clone()));
    let records: Arc<dyn RecordStore> =
        Arc::new(PostgresRecordStore::new(db.clone(), metadata.clone()));
    let link_engine: Arc<dyn LinkEngine> = Arc::new(PostgresLinkEngine::new(
        metadata.clone(),
        schema,
        records.clone(),
    ));
    let transactions: Arc<dyn TransactionManager> = Arc::new(PostgresTransactionManager::new(db));

    let dependency_graph: Arc<dyn DependencyGraphBuilder> = Arc::new(PetgraphDependencyGraph::new());
    let calculation_engine: Arc<dyn CalculationEngine> =
        Arc::new(CalculationEngineImpl::new(records.clone(), metadata.clone()));
    let field_kernels: Arc<dyn FieldKernelRegistry> = Arc::new(FieldKernelRegistryImpl::new());

    let broadcast_bus: Arc<dyn EventBusProvider> = Arc::new(TokioBroadcastEventBus::new());
    let event_bus: Arc<dyn TransactionalEventBus> =
        Arc::new(TransactionalEventBusImpl::new(broadcast_bus));

    let record_service = Arc::new(RecordService::new(
        records.clone(),
        metadata.clone(),
        field_kernels,
        dependency_graph.clone(),
        calculation_engine,
        link_engine.clone(),
        event_bus,
        transactions.clone(),
    ));
    let link_field_service = Arc::new(LinkFieldService::new(link_engine, dependency_graph, transactions));

    tracing::info!("connecting to redis");
    let pubsub: Arc<dyn PubSubBroker> = Arc::new(
        RedisPubSubBroker::connect(&config.redis.url)
            .await
            .context("failed to connect to redis")?,
    );

    let metrics: Arc<dyn MetricsProvider> = Arc::new(InMemoryMetricsProvider::new());

    let state = Arc::new(AppState::new(
        record_service,
        link_field_service,
        records,
        metadata,
        pubsub,
        Arc::new(NoopAuthVerifier),
        metrics,
    ));

    let app = collaboration_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "gridbase listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Waits for either Ctrl+C or, on Unix, `SIGTERM` — whichever arrives
/// first triggers axum's graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
