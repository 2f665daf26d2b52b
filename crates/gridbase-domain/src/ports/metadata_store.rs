//! C2 — Metadata Store port, spec §4.2.

use async_trait::async_trait;

use crate::entities::{Base, Field, Table, View};
use crate::error::Result;
use crate::value_objects::{BaseId, FieldId, TableId, ViewId};

/// CRUD for Base/Table/Field/View rows with soft delete, plus the
/// JSONB-containment link lookup spec §4.2 names.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save_base(&self, base: &Base) -> Result<()>;
    async fn find_base(&self, id: BaseId) -> Result<Option<Base>>;
    async fn soft_delete_base(&self, id: BaseId) -> Result<()>;

    async fn save_table(&self, table: &Table) -> Result<()>;
    async fn find_table(&self, id: TableId) -> Result<Option<Table>>;
    async fn find_tables_by_base(&self, base_id: BaseId) -> Result<Vec<Table>>;
    async fn soft_delete_table(&self, id: TableId) -> Result<()>;

    /// Upserts a Field row. Enforces uniqueness of `(table_id,
    /// field_name)` among non-deleted fields (spec §4.2). Invalidates
    /// the per-field and per-table caches synchronously before
    /// returning, per spec §4.2's cache invalidation rule.
    async fn save_field(&self, field: &Field) -> Result<()>;
    async fn find_field(&self, id: FieldId) -> Result<Option<Field>>;
    /// All non-deleted fields of a table, in `field_order`.
    async fn find_fields_by_table(&self, table_id: TableId) -> Result<Vec<Field>>;
    async fn soft_delete_field(&self, id: FieldId) -> Result<()>;

    /// All Link fields across every table whose options reference
    /// `table_id` as `linkedTableId`, spec §4.2's
    /// `FindLinkFieldsToTable` — a JSONB containment query accelerated
    /// by a GIN index in the Postgres implementation.
    async fn find_link_fields_to_table(&self, table_id: TableId) -> Result<Vec<Field>>;

    async fn save_view(&self, view: &View) -> Result<()>;
    async fn find_view(&self, id: ViewId) -> Result<Option<View>>;
    async fn soft_delete_view(&self, id: ViewId) -> Result<()>;
}
