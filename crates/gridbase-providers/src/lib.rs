//! Concrete PostgreSQL adapters for every storage-facing port: dynamic
//! per-Base schema (C1), the `gridbase_catalog` metadata store (C2),
//! dynamic record reads/writes (C3), and the symmetric Link Engine
//! (C5). `gridbase-application`'s use-case logic never imports this
//! crate directly — only the composition root wires these adapters
//! against `Arc<dyn Trait>`.

pub mod link;
pub mod metadata;
pub mod record;
pub mod schema;
pub mod transaction;

pub use link::PostgresLinkEngine;
pub use metadata::{ensure_catalog_schema, PostgresMetadataStore};
pub use record::PostgresRecordStore;
pub use schema::{PostgresSchemaDdlGenerator, PostgresSchemaProvider};
pub use transaction::{PostgresTransaction, PostgresTransactionManager};
