//! Ambient infrastructure: configuration, structured logging, the
//! moka-backed cache, the in-process/event-bus and Redis pub/sub
//! broadcast paths, and database pool setup. Everything here is a
//! concrete adapter behind a `gridbase-domain` port; nothing in this
//! crate is imported by `gridbase-application`'s use-case logic
//! directly — only the composition root (`gridbase`/`gridbase-server`)
//! wires adapters from here against `Arc<dyn Trait>`.

pub mod cache;
pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod pubsub;
