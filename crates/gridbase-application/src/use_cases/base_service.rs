//! Base lifecycle orchestration, spec §4.1/§4.2: provisioning the
//! isolated SQL schema a Base owns before its catalog row exists, and
//! tearing the schema down after the catalog row is tombstoned.

use std::sync::Arc;

use chrono::Utc;

use gridbase_domain::entities::Base;
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::metadata_store::MetadataStore;
use gridbase_domain::ports::schema_provider::SchemaProvider;
use gridbase_domain::value_objects::BaseId;

pub struct BaseService {
    schema: Arc<dyn SchemaProvider>,
    metadata: Arc<dyn MetadataStore>,
}

impl BaseService {
    #[must_use]
    pub fn new(schema: Arc<dyn SchemaProvider>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { schema, metadata }
    }

    /// `CREATE SCHEMA` first, catalog row second — a Base row that
    /// outlives its schema would leave every table underneath it
    /// unreachable.
    pub async fn create_base(&self, space_id: String, name: String, created_by: String) -> Result<Base> {
        let base = Base {
            id: BaseId::new(),
            space_id,
            name,
            order: 0.0,
            schema_pass: None,
            created_by,
            created_time: Utc::now(),
            last_modified_time: None,
            deleted_time: None,
        };

        self.schema.create_schema(base.id).await?;
        self.metadata.save_base(&base).await?;
        Ok(base)
    }

    /// Tombstones the catalog row first, then drops the schema with
    /// `CASCADE` — the reverse order from creation, so a crash between
    /// the two steps leaves an orphaned schema rather than a `Base` row
    /// pointing at nothing.
    pub async fn delete_base(&self, base_id: BaseId) -> Result<()> {
        if self.metadata.find_base(base_id).await?.is_none() {
            return Err(Error::not_found("base", base_id.to_string()));
        }
        self.metadata.soft_delete_base(base_id).await?;
        self.schema.drop_schema(base_id, true).await
    }
}
