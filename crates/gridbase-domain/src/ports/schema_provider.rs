//! C1 — Schema Provider port, spec §4.1.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::ColumnDef;
use crate::value_objects::{BaseId, TableId};

/// Issues DDL to create/alter isolated SQL schemas and dynamic tables.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// `CREATE SCHEMA bse_<base_id>` + `REVOKE ALL ... FROM public`
    /// (spec §6). Idempotent: creating an already-existing schema is not
    /// an error.
    async fn create_schema(&self, base_id: BaseId) -> Result<()>;

    /// `DROP SCHEMA ... CASCADE` when `cascade`, else a bare drop that
    /// fails if the schema still has objects.
    async fn drop_schema(&self, base_id: BaseId, cascade: bool) -> Result<()>;

    /// Create the physical table for `table_id` inside `base_id`'s
    /// schema: the seven system columns, primary key on `__id`, `SERIAL`
    /// `__auto_number`, and the standard indexes (spec §4.1/§6).
    async fn create_physical_table(&self, base_id: BaseId, table_id: TableId) -> Result<()>;

    /// Drop the physical table for `table_id`.
    async fn drop_physical_table(&self, base_id: BaseId, table_id: TableId) -> Result<()>;

    /// `ALTER TABLE ... ADD COLUMN`.
    async fn add_column(
        &self,
        base_id: BaseId,
        table_id: TableId,
        column: ColumnDef,
    ) -> Result<()>;

    /// `ALTER TABLE ... DROP COLUMN`.
    async fn drop_column(&self, base_id: BaseId, table_id: TableId, column: &str) -> Result<()>;

    /// Widen a column's type (used for the VARCHAR→TEXT auto-migration
    /// described in SPEC_FULL §4.5).
    async fn alter_column_type(
        &self,
        base_id: BaseId,
        table_id: TableId,
        column: &str,
        new_type: crate::schema::ColumnType,
    ) -> Result<()>;

    /// `ALTER TABLE ... ADD CONSTRAINT ... UNIQUE`.
    async fn add_unique_constraint(
        &self,
        base_id: BaseId,
        table_id: TableId,
        column: &str,
    ) -> Result<()>;

    /// Create a many-to-many junction table
    /// `link_<self_field>_<foreign_field>` with self/foreign/order
    /// columns and the indexes spec §4.5 requires.
    async fn create_junction_table(
        &self,
        base_id: BaseId,
        junction_name: &str,
        self_column: &str,
        foreign_column: &str,
    ) -> Result<()>;

    /// Drop a junction table.
    async fn drop_junction_table(&self, base_id: BaseId, junction_name: &str) -> Result<()>;

    /// Fully-qualified, quoted physical table name for `table_id` inside
    /// `base_id`'s schema, e.g. `"bse_…"."tbl_…"`.
    fn physical_table_name(&self, base_id: BaseId, table_id: TableId) -> String;
}
