//! C2 — PostgreSQL [`MetadataStore`] implementation: the `gridbase_catalog`
//! schema holding Base/Table/Field/View rows, independent of the
//! per-Base dynamic schemas the [`crate::schema::PostgresSchemaProvider`]
//! manages (spec §4.2).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement, Value};
use uuid::Uuid;

use gridbase_domain::entities::{Base, Field, FieldOptions, Table, View};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::{CacheProvider, MetadataStore};
use gridbase_domain::schema::ColumnType;
use gridbase_domain::value_objects::{BaseId, FieldId, TableId, ViewId};

const CATALOG_SCHEMA: &str = "gridbase_catalog";
const FIELD_CACHE_TTL: Duration = Duration::from_secs(300);

/// `ColumnType`'s variant name, used as its catalog storage
/// representation. Kept distinct from [`ColumnType::as_postgres_type`],
/// which renders the DDL type name and is not 1:1 invertible (e.g.
/// `"DOUBLE PRECISION"` contains a space).
fn column_type_to_tag(t: ColumnType) -> &'static str {
    match t {
        ColumnType::Varchar => "varchar",
        ColumnType::Text => "text",
        ColumnType::DoublePrecision => "doublePrecision",
        ColumnType::Boolean => "boolean",
        ColumnType::Timestamp => "timestamp",
        ColumnType::Jsonb => "jsonb",
        ColumnType::Serial => "serial",
        ColumnType::Integer => "integer",
    }
}

fn column_type_from_tag(tag: &str) -> Result<ColumnType> {
    match tag {
        "varchar" => Ok(ColumnType::Varchar),
        "text" => Ok(ColumnType::Text),
        "doublePrecision" => Ok(ColumnType::DoublePrecision),
        "boolean" => Ok(ColumnType::Boolean),
        "timestamp" => Ok(ColumnType::Timestamp),
        "jsonb" => Ok(ColumnType::Jsonb),
        "serial" => Ok(ColumnType::Serial),
        "integer" => Ok(ColumnType::Integer),
        other => Err(Error::Database { message: format!("unknown column type tag: {other}"), source: None }),
    }
}

/// Idempotent catalog-schema migration, run once at startup by the
/// composition root before any `MetadataStore` method is called.
///
/// # Errors
///
/// Returns [`Error::Database`] if any statement fails.
pub async fn ensure_catalog_schema(db: &DatabaseConnection) -> Result<()> {
    let statements = [
        format!("CREATE SCHEMA IF NOT EXISTS {CATALOG_SCHEMA}"),
        format!(
            "CREATE TABLE IF NOT EXISTS {CATALOG_SCHEMA}.base (
                id UUID PRIMARY KEY,
                space_id TEXT NOT NULL,
                name TEXT NOT NULL,
                \"order\" DOUBLE PRECISION NOT NULL,
                schema_pass TEXT,
                created_by TEXT NOT NULL,
                created_time TIMESTAMPTZ NOT NULL,
                last_modified_time TIMESTAMPTZ,
                deleted_time TIMESTAMPTZ
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {CATALOG_SCHEMA}.table_meta (
                id UUID PRIMARY KEY,
                base_id UUID NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                icon TEXT,
                db_table_name TEXT NOT NULL,
                version BIGINT NOT NULL,
                \"order\" DOUBLE PRECISION NOT NULL,
                created_by TEXT NOT NULL,
                created_time TIMESTAMPTZ NOT NULL,
                deleted_time TIMESTAMPTZ
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS table_meta_base_id_idx ON {CATALOG_SCHEMA}.table_meta (base_id)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {CATALOG_SCHEMA}.field (
                id UUID PRIMARY KEY,
                table_id UUID NOT NULL,
                name TEXT NOT NULL,
                field_type TEXT NOT NULL,
                db_field_name TEXT NOT NULL,
                db_field_type TEXT NOT NULL,
                options JSONB NOT NULL,
                is_computed BOOLEAN NOT NULL,
                is_lookup BOOLEAN NOT NULL,
                field_order DOUBLE PRECISION NOT NULL,
                is_pending BOOLEAN NOT NULL,
                has_error BOOLEAN NOT NULL,
                lookup_options_snapshot JSONB,
                created_by TEXT NOT NULL,
                created_time TIMESTAMPTZ NOT NULL,
                deleted_time TIMESTAMPTZ
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS field_table_id_idx ON {CATALOG_SCHEMA}.field (table_id)"),
        // Accelerates `find_link_fields_to_table`'s containment query
        // (spec §4.2).
        format!(
            "CREATE INDEX IF NOT EXISTS field_options_gin_idx ON {CATALOG_SCHEMA}.field USING GIN (options jsonb_path_ops)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {CATALOG_SCHEMA}.view (
                id UUID PRIMARY KEY,
                table_id UUID NOT NULL,
                name TEXT NOT NULL,
                view_type TEXT NOT NULL,
                filter JSONB,
                sort JSONB,
                \"group\" JSONB,
                column_meta JSONB,
                options JSONB,
                \"order\" DOUBLE PRECISION NOT NULL,
                share_id TEXT UNIQUE,
                deleted_time TIMESTAMPTZ
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS view_table_id_idx ON {CATALOG_SCHEMA}.view (table_id)"),
    ];

    for sql in statements {
        db.execute(Statement::from_string(db.get_database_backend(), sql))
            .await
            .map_err(|err| Error::Database { message: err.to_string(), source: Some(Box::new(err)) })?;
    }
    Ok(())
}

fn db_error(err: sea_orm::DbErr) -> Error {
    Error::Database { message: err.to_string(), source: Some(Box::new(err)) }
}

#[derive(Debug, FromQueryResult)]
struct BaseRow {
    id: Uuid,
    space_id: String,
    name: String,
    order: f64,
    schema_pass: Option<String>,
    created_by: String,
    created_time: DateTime<Utc>,
    last_modified_time: Option<DateTime<Utc>>,
    deleted_time: Option<DateTime<Utc>>,
}

impl From<BaseRow> for Base {
    fn from(row: BaseRow) -> Self {
        Self {
            id: BaseId::from_uuid(row.id),
            space_id: row.space_id,
            name: row.name,
            order: row.order,
            schema_pass: row.schema_pass,
            created_by: row.created_by,
            created_time: row.created_time,
            last_modified_time: row.last_modified_time,
            deleted_time: row.deleted_time,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct TableRow {
    id: Uuid,
    base_id: Uuid,
    name: String,
    description: Option<String>,
    icon: Option<String>,
    db_table_name: String,
    version: i64,
    order: f64,
    created_by: String,
    created_time: DateTime<Utc>,
    deleted_time: Option<DateTime<Utc>>,
}

impl From<TableRow> for Table {
    fn from(row: TableRow) -> Self {
        Self {
            id: TableId::from_uuid(row.id),
            base_id: BaseId::from_uuid(row.base_id),
            name: row.name,
            description: row.description,
            icon: row.icon,
            db_table_name: row.db_table_name,
            version: row.version,
            order: row.order,
            created_by: row.created_by,
            created_time: row.created_time,
            deleted_time: row.deleted_time,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct FieldRow {
    id: Uuid,
    table_id: Uuid,
    name: String,
    field_type: String,
    db_field_name: String,
    db_field_type: String,
    options: serde_json::Value,
    is_computed: bool,
    is_lookup: bool,
    field_order: f64,
    is_pending: bool,
    has_error: bool,
    lookup_options_snapshot: Option<serde_json::Value>,
    created_by: String,
    created_time: DateTime<Utc>,
    deleted_time: Option<DateTime<Utc>>,
}

impl FieldRow {
    fn into_domain(self) -> Result<Field> {
        let options: FieldOptions = serde_json::from_value(self.options)
            .map_err(|err| Error::Json { source: err })?;
        let db_field_type = column_type_from_tag(&self.db_field_type)?;
        let lookup_options_snapshot = self
            .lookup_options_snapshot
            .map(|json| serde_json::from_value(json).map_err(|err| Error::Json { source: err }))
            .transpose()?
            .map(Box::new);
        Ok(Field {
            id: FieldId::from_uuid(self.id),
            table_id: TableId::from_uuid(self.table_id),
            name: self.name,
            field_type: options.field_type(),
            db_field_name: self.db_field_name,
            db_field_type,
            options,
            is_computed: self.is_computed,
            is_lookup: self.is_lookup,
            field_order: self.field_order,
            is_pending: self.is_pending,
            has_error: self.has_error,
            lookup_options_snapshot,
            created_by: self.created_by,
            created_time: self.created_time,
            deleted_time: self.deleted_time,
        })
    }
}

#[derive(Debug, FromQueryResult)]
struct ViewRow {
    id: Uuid,
    table_id: Uuid,
    name: String,
    view_type: String,
    filter: Option<serde_json::Value>,
    sort: Option<serde_json::Value>,
    group: Option<serde_json::Value>,
    column_meta: Option<serde_json::Value>,
    options: Option<serde_json::Value>,
    order: f64,
    share_id: Option<String>,
    deleted_time: Option<DateTime<Utc>>,
}

impl From<ViewRow> for View {
    fn from(row: ViewRow) -> Self {
        Self {
            id: ViewId::from_uuid(row.id),
            table_id: TableId::from_uuid(row.table_id),
            name: row.name,
            view_type: row.view_type,
            filter: row.filter,
            sort: row.sort,
            group: row.group,
            column_meta: row.column_meta,
            options: row.options,
            order: row.order,
            share_id: row.share_id,
            deleted_time: row.deleted_time,
        }
    }
}

/// Postgres-backed catalog store. `cache` invalidates field/table reads
/// synchronously on write, per spec §4.2's cache invalidation rule;
/// `None` disables caching (used in tests).
pub struct PostgresMetadataStore {
    db: DatabaseConnection,
    cache: Option<Arc<dyn CacheProvider>>,
}

impl PostgresMetadataStore {
    #[must_use]
    pub fn new(db: DatabaseConnection, cache: Option<Arc<dyn CacheProvider>>) -> Self {
        Self { db, cache }
    }

    async fn invalidate_field(&self, field_id: FieldId, table_id: TableId) {
        if let Some(cache) = &self.cache {
            let _ = cache.invalidate(&format!("field:{field_id}")).await;
            let _ = cache.invalidate(&format!("table_fields:{table_id}")).await;
        }
    }

    fn backend(&self) -> sea_orm::DatabaseBackend {
        self.db.get_database_backend()
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn save_base(&self, base: &Base) -> Result<()> {
        let sql = format!(
            "INSERT INTO {CATALOG_SCHEMA}.base
                (id, space_id, name, \"order\", schema_pass, created_by, created_time, last_modified_time, deleted_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                space_id = EXCLUDED.space_id,
                name = EXCLUDED.name,
                \"order\" = EXCLUDED.\"order\",
                schema_pass = EXCLUDED.schema_pass,
                last_modified_time = EXCLUDED.last_modified_time,
                deleted_time = EXCLUDED.deleted_time"
        );
        let values: Vec<Value> = vec![
            base.id.as_uuid().into(),
            base.space_id.clone().into(),
            base.name.clone().into(),
            base.order.into(),
            base.schema_pass.clone().into(),
            base.created_by.clone().into(),
            base.created_time.into(),
            base.last_modified_time.into(),
            base.deleted_time.into(),
        ];
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, values))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_base(&self, id: BaseId) -> Result<Option<Base>> {
        let sql = format!("SELECT * FROM {CATALOG_SCHEMA}.base WHERE id = $1");
        let row = BaseRow::find_by_statement(Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![id.as_uuid().into()],
        ))
        .one(&self.db)
        .await
        .map_err(db_error)?;
        Ok(row.map(Base::from))
    }

    async fn soft_delete_base(&self, id: BaseId) -> Result<()> {
        let sql = format!("UPDATE {CATALOG_SCHEMA}.base SET deleted_time = now() WHERE id = $1");
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, vec![id.as_uuid().into()]))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn save_table(&self, table: &Table) -> Result<()> {
        let sql = format!(
            "INSERT INTO {CATALOG_SCHEMA}.table_meta
                (id, base_id, name, description, icon, db_table_name, version, \"order\", created_by, created_time, deleted_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                icon = EXCLUDED.icon,
                version = EXCLUDED.version,
                \"order\" = EXCLUDED.\"order\",
                deleted_time = EXCLUDED.deleted_time"
        );
        let values: Vec<Value> = vec![
            table.id.as_uuid().into(),
            table.base_id.as_uuid().into(),
            table.name.clone().into(),
            table.description.clone().into(),
            table.icon.clone().into(),
            table.db_table_name.clone().into(),
            table.version.into(),
            table.order.into(),
            table.created_by.clone().into(),
            table.created_time.into(),
            table.deleted_time.into(),
        ];
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, values))
            .await
            .map_err(db_error)?;
        if let Some(cache) = &self.cache {
            let _ = cache.invalidate(&format!("table_fields:{}", table.id)).await;
        }
        Ok(())
    }

    async fn find_table(&self, id: TableId) -> Result<Option<Table>> {
        let sql = format!("SELECT * FROM {CATALOG_SCHEMA}.table_meta WHERE id = $1");
        let row = TableRow::find_by_statement(Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![id.as_uuid().into()],
        ))
        .one(&self.db)
        .await
        .map_err(db_error)?;
        Ok(row.map(Table::from))
    }

    async fn find_tables_by_base(&self, base_id: BaseId) -> Result<Vec<Table>> {
        let sql = format!(
            "SELECT * FROM {CATALOG_SCHEMA}.table_meta WHERE base_id = $1 AND deleted_time IS NULL ORDER BY \"order\""
        );
        let rows = TableRow::find_by_statement(Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![base_id.as_uuid().into()],
        ))
        .all(&self.db)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Table::from).collect())
    }

    async fn soft_delete_table(&self, id: TableId) -> Result<()> {
        let sql = format!("UPDATE {CATALOG_SCHEMA}.table_meta SET deleted_time = now() WHERE id = $1");
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, vec![id.as_uuid().into()]))
            .await
            .map_err(db_error)?;
        if let Some(cache) = &self.cache {
            let _ = cache.invalidate(&format!("table_fields:{id}")).await;
        }
        Ok(())
    }

    async fn save_field(&self, field: &Field) -> Result<()> {
        let duplicate_sql = format!(
            "SELECT 1 FROM {CATALOG_SCHEMA}.field
             WHERE table_id = $1 AND name = $2 AND id != $3 AND deleted_time IS NULL"
        );
        let duplicate = self
            .db
            .query_one(Statement::from_sql_and_values(
                self.backend(),
                duplicate_sql,
                vec![field.table_id.as_uuid().into(), field.name.clone().into(), field.id.as_uuid().into()],
            ))
            .await
            .map_err(db_error)?;
        if duplicate.is_some() {
            return Err(Error::conflict(format!(
                "field name '{}' already exists on this table",
                field.name
            )));
        }

        let options = serde_json::to_value(&field.options).map_err(|err| Error::Json { source: err })?;
        let lookup_snapshot = field
            .lookup_options_snapshot
            .as_deref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| Error::Json { source: err })?;

        let sql = format!(
            "INSERT INTO {CATALOG_SCHEMA}.field
                (id, table_id, name, field_type, db_field_name, db_field_type, options, is_computed,
                 is_lookup, field_order, is_pending, has_error, lookup_options_snapshot, created_by,
                 created_time, deleted_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                options = EXCLUDED.options,
                is_pending = EXCLUDED.is_pending,
                has_error = EXCLUDED.has_error,
                lookup_options_snapshot = EXCLUDED.lookup_options_snapshot,
                field_order = EXCLUDED.field_order,
                deleted_time = EXCLUDED.deleted_time"
        );
        let values: Vec<Value> = vec![
            field.id.as_uuid().into(),
            field.table_id.as_uuid().into(),
            field.name.clone().into(),
            field.field_type.to_string().into(),
            field.db_field_name.clone().into(),
            column_type_to_tag(field.db_field_type).into(),
            options.into(),
            field.is_computed.into(),
            field.is_lookup.into(),
            field.field_order.into(),
            field.is_pending.into(),
            field.has_error.into(),
            lookup_snapshot.into(),
            field.created_by.clone().into(),
            field.created_time.into(),
            field.deleted_time.into(),
        ];
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, values))
            .await
            .map_err(db_error)?;

        self.invalidate_field(field.id, field.table_id).await;
        Ok(())
    }

    async fn find_field(&self, id: FieldId) -> Result<Option<Field>> {
        if let Some(cache) = &self.cache {
            if let Some(json) = cache.get_json(&format!("field:{id}")).await? {
                let field: Field = serde_json::from_str(&json).map_err(|err| Error::Json { source: err })?;
                return Ok(Some(field));
            }
        }
        let sql = format!("SELECT * FROM {CATALOG_SCHEMA}.field WHERE id = $1");
        let row = FieldRow::find_by_statement(Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![id.as_uuid().into()],
        ))
        .one(&self.db)
        .await
        .map_err(db_error)?;
        let field = row.map(FieldRow::into_domain).transpose()?;
        if let (Some(cache), Some(field)) = (&self.cache, &field) {
            if let Ok(json) = serde_json::to_string(field) {
                let _ = cache.set_json(&format!("field:{id}"), &json, FIELD_CACHE_TTL).await;
            }
        }
        Ok(field)
    }

    async fn find_fields_by_table(&self, table_id: TableId) -> Result<Vec<Field>> {
        let sql = format!(
            "SELECT * FROM {CATALOG_SCHEMA}.field WHERE table_id = $1 AND deleted_time IS NULL ORDER BY field_order"
        );
        let rows = FieldRow::find_by_statement(Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![table_id.as_uuid().into()],
        ))
        .all(&self.db)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(FieldRow::into_domain).collect()
    }

    async fn soft_delete_field(&self, id: FieldId) -> Result<()> {
        let table_sql = format!("SELECT table_id FROM {CATALOG_SCHEMA}.field WHERE id = $1");
        let existing = self
            .db
            .query_one(Statement::from_sql_and_values(self.backend(), table_sql, vec![id.as_uuid().into()]))
            .await
            .map_err(db_error)?;
        let table_id = existing
            .map(|row| row.try_get::<Uuid>("", "table_id"))
            .transpose()
            .map_err(db_error)?
            .map(TableId::from_uuid);

        let sql = format!("UPDATE {CATALOG_SCHEMA}.field SET deleted_time = now() WHERE id = $1");
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, vec![id.as_uuid().into()]))
            .await
            .map_err(db_error)?;

        if let Some(table_id) = table_id {
            self.invalidate_field(id, table_id).await;
        }
        Ok(())
    }

    async fn find_link_fields_to_table(&self, table_id: TableId) -> Result<Vec<Field>> {
        let containment = serde_json::json!({ "linkedTableId": table_id.as_uuid().to_string() });
        let sql = format!(
            "SELECT * FROM {CATALOG_SCHEMA}.field
             WHERE field_type = 'link' AND deleted_time IS NULL AND options @> $1"
        );
        let rows = FieldRow::find_by_statement(Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![containment.into()],
        ))
        .all(&self.db)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(FieldRow::into_domain).collect()
    }

    async fn save_view(&self, view: &View) -> Result<()> {
        let sql = format!(
            "INSERT INTO {CATALOG_SCHEMA}.view
                (id, table_id, name, view_type, filter, sort, \"group\", column_meta, options, \"order\", share_id, deleted_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                filter = EXCLUDED.filter,
                sort = EXCLUDED.sort,
                \"group\" = EXCLUDED.\"group\",
                column_meta = EXCLUDED.column_meta,
                options = EXCLUDED.options,
                \"order\" = EXCLUDED.\"order\",
                deleted_time = EXCLUDED.deleted_time"
        );
        let values: Vec<Value> = vec![
            view.id.as_uuid().into(),
            view.table_id.as_uuid().into(),
            view.name.clone().into(),
            view.view_type.clone().into(),
            view.filter.clone().into(),
            view.sort.clone().into(),
            view.group.clone().into(),
            view.column_meta.clone().into(),
            view.options.clone().into(),
            view.order.into(),
            view.share_id.clone().into(),
            view.deleted_time.into(),
        ];
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, values))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_view(&self, id: ViewId) -> Result<Option<View>> {
        let sql = format!("SELECT * FROM {CATALOG_SCHEMA}.view WHERE id = $1");
        let row = ViewRow::find_by_statement(Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![id.as_uuid().into()],
        ))
        .one(&self.db)
        .await
        .map_err(db_error)?;
        Ok(row.map(View::from))
    }

    async fn soft_delete_view(&self, id: ViewId) -> Result<()> {
        let sql = format!("UPDATE {CATALOG_SCHEMA}.view SET deleted_time = now() WHERE id = $1");
        self.db
            .execute(Statement::from_sql_and_values(self.backend(), sql, vec![id.as_uuid().into()]))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_tags_round_trip() {
        for t in [
            ColumnType::Varchar,
            ColumnType::Text,
            ColumnType::DoublePrecision,
            ColumnType::Boolean,
            ColumnType::Timestamp,
            ColumnType::Jsonb,
            ColumnType::Serial,
            ColumnType::Integer,
        ] {
            let tag = column_type_to_tag(t);
            assert_eq!(column_type_from_tag(tag).unwrap(), t);
        }
    }

    #[test]
    fn unknown_tag_is_a_database_error() {
        let err = column_type_from_tag("money").unwrap_err();
        assert!(matches!(err, Error::Database { .. }));
    }
}
