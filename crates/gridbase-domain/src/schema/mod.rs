//! The canonical schema model: backend-agnostic column/table/index
//! definitions, plus the identifier-safety helpers every DDL path in
//! [`crate::ports::schema_provider`] must run through.

mod identifier;

pub use identifier::{quote_ident, validate_identifier};

use crate::value_objects::{BaseId, TableId};

/// Logical column type used by the canonical schema model, spec §4.1's
/// type-mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Varchar,
    Text,
    DoublePrecision,
    Boolean,
    Timestamp,
    Jsonb,
    /// SERIAL primary key (auto-number).
    Serial,
    /// Plain 64-bit integer, used by `__version` (spec §6).
    Integer,
}

use serde::{Deserialize, Serialize};

impl ColumnType {
    /// Render as a PostgreSQL type name.
    #[must_use]
    pub fn as_postgres_type(self) -> &'static str {
        match self {
            Self::Varchar => "VARCHAR",
            Self::Text => "TEXT",
            Self::DoublePrecision => "DOUBLE PRECISION",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
            Self::Jsonb => "JSONB",
            // BIGSERIAL, not SERIAL: `__auto_number` is `i64` (spec §3), and
            // plain SERIAL only covers the 32-bit range.
            Self::Serial => "BIGSERIAL",
            Self::Integer => "BIGINT",
        }
    }
}

/// Canonical column definition used when issuing DDL.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub type_: ColumnType,
    pub primary_key: bool,
    pub unique: bool,
    pub not_null: bool,
    pub default: Option<String>,
}

/// Canonical table definition: the seven system columns plus whatever
/// user columns the caller supplies.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// Port for generating backend-specific DDL from the canonical schema;
/// the only abstraction boundary between the Schema Provider's logic and
/// a specific SQL dialect (spec §4.1).
pub trait SchemaDdlGenerator: Send + Sync {
    /// Emit `CREATE TABLE` (plus inline constraints) for `table` inside
    /// `schema`.
    fn create_table_ddl(&self, schema: &str, table: &TableDef) -> String;

    /// Emit `CREATE SCHEMA` + `REVOKE ALL ... FROM public`.
    fn create_schema_ddl(&self, schema: &str) -> Vec<String>;

    /// Emit `DROP SCHEMA ... CASCADE` or a bare `DROP SCHEMA`.
    fn drop_schema_ddl(&self, schema: &str, cascade: bool) -> String;

    /// Emit `ALTER TABLE ... ADD COLUMN`.
    fn add_column_ddl(&self, schema: &str, table: &str, column: &ColumnDef) -> String;

    /// Emit `ALTER TABLE ... DROP COLUMN`.
    fn drop_column_ddl(&self, schema: &str, table: &str, column: &str) -> String;

    /// Emit the index statements standard on every physical table, spec
    /// §6.
    fn standard_indexes_ddl(&self, schema: &str, table: &str) -> Vec<String>;
}

/// The SQL schema name owned by a Base: `bse_<id>`.
#[must_use]
pub fn base_schema_name(base_id: BaseId) -> String {
    format!("bse_{}", base_id.as_uuid().simple())
}

/// The physical table name owned by a Table: `tbl_<id>`.
#[must_use]
pub fn table_name(table_id: TableId) -> String {
    format!("tbl_{}", table_id.as_uuid().simple())
}
