//! Table lifecycle orchestration, spec §4.1/§4.2 — the known gap
//! `DESIGN.md` used to record: nothing called
//! [`SchemaProvider::physical_table_name`] and
//! [`SchemaProvider::create_physical_table`] before
//! [`MetadataStore::save_table`] populated a new `Table` row's
//! `db_table_name`.

use std::sync::Arc;

use chrono::Utc;

use gridbase_domain::entities::Table;
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::metadata_store::MetadataStore;
use gridbase_domain::ports::schema_provider::SchemaProvider;
use gridbase_domain::value_objects::{BaseId, TableId};

pub struct TableService {
    schema: Arc<dyn SchemaProvider>,
    metadata: Arc<dyn MetadataStore>,
}

impl TableService {
    #[must_use]
    pub fn new(schema: Arc<dyn SchemaProvider>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { schema, metadata }
    }

    /// Physical table first, so `db_table_name` is always backed by a
    /// real table by the time the catalog row naming it is readable.
    pub async fn create_table(
        &self,
        base_id: BaseId,
        name: String,
        description: Option<String>,
        created_by: String,
    ) -> Result<Table> {
        if self.metadata.find_base(base_id).await?.is_none() {
            return Err(Error::not_found("base", base_id.to_string()));
        }

        let table_id = TableId::new();
        self.schema.create_physical_table(base_id, table_id).await?;
        let db_table_name = self.schema.physical_table_name(base_id, table_id);

        let table = Table {
            id: table_id,
            base_id,
            name,
            description,
            icon: None,
            db_table_name,
            version: 1,
            order: 0.0,
            created_by,
            created_time: Utc::now(),
            deleted_time: None,
        };

        self.metadata.save_table(&table).await?;
        Ok(table)
    }

    pub async fn delete_table(&self, table_id: TableId) -> Result<()> {
        let table = self
            .metadata
            .find_table(table_id)
            .await?
            .ok_or_else(|| Error::not_found("table", table_id.to_string()))?;

        self.metadata.soft_delete_table(table_id).await?;
        self.schema.drop_physical_table(table.base_id, table_id).await
    }
}
