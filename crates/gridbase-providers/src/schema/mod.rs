//! C1 — PostgreSQL [`SchemaProvider`] implementation: per-Base isolated
//! schemas, dynamic physical tables, and junction tables for many-to-many
//! links (spec §4.1/§4.5/§6).

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};

use gridbase_domain::constants::system_columns;
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::SchemaProvider;
use gridbase_domain::schema::{
    base_schema_name, quote_ident, table_name, validate_identifier, ColumnDef, ColumnType,
    SchemaDdlGenerator, TableDef,
};
use gridbase_domain::value_objects::{BaseId, TableId};

/// Generates PostgreSQL DDL strings from the canonical schema model.
/// Grounded on the teacher's `SqliteSchemaDdlGenerator`: pure string
/// rendering, no I/O, so it is trivially unit-testable.
#[derive(Debug, Clone, Default)]
pub struct PostgresSchemaDdlGenerator;

impl SchemaDdlGenerator for PostgresSchemaDdlGenerator {
    fn create_table_ddl(&self, schema: &str, table: &TableDef) -> String {
        let cols: Vec<String> = table.columns.iter().map(column_ddl_fragment).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({})",
            quote_ident(schema),
            quote_ident(&table.name),
            cols.join(", ")
        )
    }

    fn create_schema_ddl(&self, schema: &str) -> Vec<String> {
        vec![
            format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)),
            format!("REVOKE ALL ON SCHEMA {} FROM PUBLIC", quote_ident(schema)),
        ]
    }

    fn drop_schema_ddl(&self, schema: &str, cascade: bool) -> String {
        if cascade {
            format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(schema))
        } else {
            format!("DROP SCHEMA IF EXISTS {}", quote_ident(schema))
        }
    }

    fn add_column_ddl(&self, schema: &str, table: &str, column: &ColumnDef) -> String {
        format!(
            "ALTER TABLE {}.{} ADD COLUMN {}",
            quote_ident(schema),
            quote_ident(table),
            column_ddl_fragment(column)
        )
    }

    fn drop_column_ddl(&self, schema: &str, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {}.{} DROP COLUMN {}",
            quote_ident(schema),
            quote_ident(table),
            quote_ident(column)
        )
    }

    fn standard_indexes_ddl(&self, schema: &str, table: &str) -> Vec<String> {
        let idx_name = |suffix: &str| format!("{table}_{suffix}_idx");
        vec![
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}.{} ({})",
                quote_ident(&idx_name("auto_number")),
                quote_ident(schema),
                quote_ident(table),
                quote_ident(system_columns::AUTO_NUMBER)
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}.{} ({})",
                quote_ident(&idx_name("created_time")),
                quote_ident(schema),
                quote_ident(table),
                quote_ident(system_columns::CREATED_TIME)
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}.{} USING btree ({})",
                quote_ident(&idx_name("version")),
                quote_ident(schema),
                quote_ident(table),
                quote_ident(system_columns::VERSION)
            ),
        ]
    }
}

fn column_ddl_fragment(column: &ColumnDef) -> String {
    let mut fragment = format!(
        "{} {}",
        quote_ident(&column.name),
        column.type_.as_postgres_type()
    );
    if column.primary_key {
        fragment.push_str(" PRIMARY KEY");
    }
    if column.unique && !column.primary_key {
        fragment.push_str(" UNIQUE");
    }
    if column.not_null && !column.primary_key {
        fragment.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        fragment.push_str(" DEFAULT ");
        fragment.push_str(default);
    }
    fragment
}

/// The seven system columns plus the primary key / auto-number
/// constraints, spec §3/§6. `__version` is `INTEGER NOT NULL DEFAULT 1`
/// per §6, with its own btree index ([`standard_indexes_ddl`]) — the
/// optimistic-concurrency `UPDATE ... WHERE __version = expected`
/// compare-and-swap in the Record Store leans on that index.
fn system_table_def(table: &str) -> TableDef {
    TableDef {
        name: table.to_owned(),
        columns: vec![
            ColumnDef {
                name: system_columns::ID.to_owned(),
                type_: ColumnType::Text,
                primary_key: true,
                unique: false,
                not_null: true,
                default: None,
            },
            ColumnDef {
                name: system_columns::AUTO_NUMBER.to_owned(),
                type_: ColumnType::Serial,
                primary_key: false,
                unique: true,
                not_null: true,
                default: None,
            },
            ColumnDef {
                name: system_columns::CREATED_TIME.to_owned(),
                type_: ColumnType::Timestamp,
                primary_key: false,
                unique: false,
                not_null: true,
                default: Some("now()".to_owned()),
            },
            ColumnDef {
                name: system_columns::LAST_MODIFIED_TIME.to_owned(),
                type_: ColumnType::Timestamp,
                primary_key: false,
                unique: false,
                not_null: false,
                default: None,
            },
            ColumnDef {
                name: system_columns::CREATED_BY.to_owned(),
                type_: ColumnType::Text,
                primary_key: false,
                unique: false,
                not_null: true,
                default: None,
            },
            ColumnDef {
                name: system_columns::LAST_MODIFIED_BY.to_owned(),
                type_: ColumnType::Text,
                primary_key: false,
                unique: false,
                not_null: false,
                default: None,
            },
            ColumnDef {
                name: system_columns::VERSION.to_owned(),
                type_: ColumnType::Integer,
                primary_key: false,
                unique: false,
                not_null: true,
                default: Some("1".to_owned()),
            },
        ],
    }
}

pub struct PostgresSchemaProvider {
    db: DatabaseConnection,
    ddl: PostgresSchemaDdlGenerator,
}

impl PostgresSchemaProvider {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, ddl: PostgresSchemaDdlGenerator }
    }

    async fn execute(&self, sql: String) -> Result<()> {
        self.db
            .execute(Statement::from_string(self.db.get_database_backend(), sql))
            .await
            .map_err(|err| Error::Database { message: err.to_string(), source: Some(Box::new(err)) })?;
        Ok(())
    }
}

#[async_trait]
impl SchemaProvider for PostgresSchemaProvider {
    async fn create_schema(&self, base_id: BaseId) -> Result<()> {
        let schema = base_schema_name(base_id);
        for stmt in self.ddl.create_schema_ddl(&schema) {
            self.execute(stmt).await?;
        }
        Ok(())
    }

    async fn drop_schema(&self, base_id: BaseId, cascade: bool) -> Result<()> {
        let schema = base_schema_name(base_id);
        self.execute(self.ddl.drop_schema_ddl(&schema, cascade)).await
    }

    async fn create_physical_table(&self, base_id: BaseId, table_id: TableId) -> Result<()> {
        let schema = base_schema_name(base_id);
        let table = table_name(table_id);
        let def = system_table_def(&table);
        self.execute(self.ddl.create_table_ddl(&schema, &def)).await?;
        for stmt in self.ddl.standard_indexes_ddl(&schema, &table) {
            self.execute(stmt).await?;
        }
        Ok(())
    }

    async fn drop_physical_table(&self, base_id: BaseId, table_id: TableId) -> Result<()> {
        let schema = base_schema_name(base_id);
        let table = table_name(table_id);
        self.execute(format!(
            "DROP TABLE IF EXISTS {}.{} CASCADE",
            quote_ident(&schema),
            quote_ident(&table)
        ))
        .await
    }

    async fn add_column(&self, base_id: BaseId, table_id: TableId, column: ColumnDef) -> Result<()> {
        validate_identifier(&column.name)?;
        let schema = base_schema_name(base_id);
        let table = table_name(table_id);
        self.execute(self.ddl.add_column_ddl(&schema, &table, &column)).await
    }

    async fn drop_column(&self, base_id: BaseId, table_id: TableId, column: &str) -> Result<()> {
        validate_identifier(column)?;
        let schema = base_schema_name(base_id);
        let table = table_name(table_id);
        self.execute(self.ddl.drop_column_ddl(&schema, &table, column)).await
    }

    async fn alter_column_type(
        &self,
        base_id: BaseId,
        table_id: TableId,
        column: &str,
        new_type: ColumnType,
    ) -> Result<()> {
        validate_identifier(column)?;
        let schema = base_schema_name(base_id);
        let table = table_name(table_id);
        self.execute(format!(
            "ALTER TABLE {}.{} ALTER COLUMN {} TYPE {} USING {}::{}",
            quote_ident(&schema),
            quote_ident(&table),
            quote_ident(column),
            new_type.as_postgres_type(),
            quote_ident(column),
            new_type.as_postgres_type(),
        ))
        .await
    }

    async fn add_unique_constraint(&self, base_id: BaseId, table_id: TableId, column: &str) -> Result<()> {
        validate_identifier(column)?;
        let schema = base_schema_name(base_id);
        let table = table_name(table_id);
        let constraint_name = format!("{table}_{column}_key");
        validate_identifier(&constraint_name)?;
        self.execute(format!(
            "ALTER TABLE {}.{} ADD CONSTRAINT {} UNIQUE ({})",
            quote_ident(&schema),
            quote_ident(&table),
            quote_ident(&constraint_name),
            quote_ident(column),
        ))
        .await
    }

    async fn create_junction_table(
        &self,
        base_id: BaseId,
        junction_name: &str,
        self_column: &str,
        foreign_column: &str,
    ) -> Result<()> {
        validate_identifier(junction_name)?;
        validate_identifier(self_column)?;
        validate_identifier(foreign_column)?;
        let schema = base_schema_name(base_id);
        self.execute(format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({} TEXT NOT NULL, {} TEXT NOT NULL, \"order\" DOUBLE PRECISION NOT NULL, PRIMARY KEY ({}, {}))",
            quote_ident(&schema),
            quote_ident(junction_name),
            quote_ident(self_column),
            quote_ident(foreign_column),
            quote_ident(self_column),
            quote_ident(foreign_column),
        ))
        .await?;
        self.execute(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}.{} ({})",
            quote_ident(&format!("{junction_name}_{foreign_column}_idx")),
            quote_ident(&schema),
            quote_ident(junction_name),
            quote_ident(foreign_column),
        ))
        .await
    }

    async fn drop_junction_table(&self, base_id: BaseId, junction_name: &str) -> Result<()> {
        validate_identifier(junction_name)?;
        let schema = base_schema_name(base_id);
        self.execute(format!(
            "DROP TABLE IF EXISTS {}.{} CASCADE",
            quote_ident(&schema),
            quote_ident(junction_name)
        ))
        .await
    }

    fn physical_table_name(&self, base_id: BaseId, table_id: TableId) -> String {
        format!(
            "{}.{}",
            quote_ident(&base_schema_name(base_id)),
            quote_ident(&table_name(table_id))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_create_table_with_system_columns() {
        let ddl = PostgresSchemaDdlGenerator;
        let def = system_table_def("tbl_x");
        let sql = ddl.create_table_ddl("bse_x", &def);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"bse_x\".\"tbl_x\""));
        assert!(sql.contains("\"__id\" TEXT PRIMARY KEY"));
        assert!(sql.contains("\"__auto_number\" BIGSERIAL UNIQUE"));
    }

    #[test]
    fn drop_schema_cascade_toggle() {
        let ddl = PostgresSchemaDdlGenerator;
        assert!(ddl.drop_schema_ddl("bse_x", true).ends_with("CASCADE"));
        assert!(!ddl.drop_schema_ddl("bse_x", false).ends_with("CASCADE"));
    }
}
