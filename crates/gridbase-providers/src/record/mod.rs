//! C3 — PostgreSQL [`RecordStore`] implementation: reads and writes
//! against each table's dynamic physical columns (spec §4.3).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryResult, Statement, Value};
use tracing::warn;

use gridbase_domain::constants::{system_columns, LARGE_OFFSET_WARNING_THRESHOLD};
use gridbase_domain::entities::{Field, Record};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::transaction::Transaction;
use gridbase_domain::ports::{MetadataStore, RecordPage, RecordStore};
use gridbase_domain::schema::{quote_ident, ColumnType};
use gridbase_domain::value_objects::{CellValue, FieldId, RecordId, TableId};

use crate::transaction::connection_of;

/// Physical-layout facts this store needs per table, cached to avoid a
/// catalog round trip on every record operation.
struct TableLayout {
    db_table_name: String,
    fields: Vec<Field>,
}

pub struct PostgresRecordStore {
    db: DatabaseConnection,
    metadata: Arc<dyn MetadataStore>,
    layouts: DashMap<TableId, Arc<TableLayout>>,
}

impl PostgresRecordStore {
    #[must_use]
    pub fn new(db: DatabaseConnection, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { db, metadata, layouts: DashMap::new() }
    }

    async fn layout(&self, table_id: TableId) -> Result<Arc<TableLayout>> {
        if let Some(layout) = self.layouts.get(&table_id) {
            return Ok(layout.clone());
        }
        let table = self
            .metadata
            .find_table(table_id)
            .await?
            .ok_or_else(|| Error::not_found("table", table_id.to_string()))?;
        let fields = self.metadata.find_fields_by_table(table_id).await?;
        let layout = Arc::new(TableLayout { db_table_name: table.db_table_name, fields });
        self.layouts.insert(table_id, layout.clone());
        Ok(layout)
    }

    /// Invalidate a cached layout after DDL changes the table's columns.
    /// Not part of the port; called by the Schema/Link Engine providers
    /// that share this store's connection pool.
    pub fn invalidate_layout(&self, table_id: TableId) {
        self.layouts.remove(&table_id);
    }

    fn backend(&self) -> sea_orm::DatabaseBackend {
        self.db.get_database_backend()
    }
}

fn db_error(err: sea_orm::DbErr) -> Error {
    Error::Database { message: err.to_string(), source: Some(Box::new(err)) }
}

fn cell_to_value(cell: &CellValue, column_type: ColumnType) -> Result<Value> {
    Ok(match (column_type, cell) {
        (ColumnType::Text | ColumnType::Varchar, CellValue::Null) => Value::String(None),
        (ColumnType::Text | ColumnType::Varchar, CellValue::Text(s)) => Value::String(Some(Box::new(s.clone()))),
        (ColumnType::Text | ColumnType::Varchar, other) => {
            Value::String(Some(Box::new(serde_json::to_string(other).map_err(|err| Error::Json { source: err })?)))
        }
        (ColumnType::DoublePrecision, CellValue::Null) => Value::Double(None),
        (ColumnType::DoublePrecision, other) => Value::Double(other.as_f64()),
        (ColumnType::Boolean, CellValue::Null) => Value::Bool(None),
        (ColumnType::Boolean, CellValue::Bool(b)) => Value::Bool(Some(*b)),
        (ColumnType::Boolean, other) => Value::Bool(Some(!other.is_empty())),
        (ColumnType::Timestamp, CellValue::DateTime(dt)) => Value::ChronoDateTimeUtc(Some(Box::new(*dt))),
        (ColumnType::Timestamp, _) => Value::ChronoDateTimeUtc(None),
        (ColumnType::Jsonb, cell) => {
            Value::Json(Some(Box::new(serde_json::to_value(cell).map_err(|err| Error::Json { source: err })?)))
        }
        (ColumnType::Serial, _) => Value::BigInt(None),
        (ColumnType::Integer, CellValue::Null) => Value::BigInt(None),
        (ColumnType::Integer, other) => Value::BigInt(other.as_f64().map(|n| n as i64)),
    })
}

fn value_to_cell(row: &QueryResult, column: &str, column_type: ColumnType) -> Result<CellValue> {
    Ok(match column_type {
        ColumnType::Text | ColumnType::Varchar => {
            row.try_get::<Option<String>>("", column).map_err(db_error)?.map_or(CellValue::Null, CellValue::Text)
        }
        ColumnType::DoublePrecision | ColumnType::Serial => row
            .try_get::<Option<f64>>("", column)
            .map_err(db_error)?
            .map_or(CellValue::Null, CellValue::Number),
        ColumnType::Integer => row
            .try_get::<Option<i64>>("", column)
            .map_err(db_error)?
            .map_or(CellValue::Null, |n| CellValue::Number(n as f64)),
        ColumnType::Boolean => {
            row.try_get::<Option<bool>>("", column).map_err(db_error)?.map_or(CellValue::Null, CellValue::Bool)
        }
        ColumnType::Timestamp => row
            .try_get::<Option<DateTime<Utc>>>("", column)
            .map_err(db_error)?
            .map_or(CellValue::Null, CellValue::DateTime),
        ColumnType::Jsonb => {
            let json = row.try_get::<Option<serde_json::Value>>("", column).map_err(db_error)?;
            match json {
                None | Some(serde_json::Value::Null) => CellValue::Null,
                Some(json) => serde_json::from_value(json).map_err(|err| Error::Json { source: err })?,
            }
        }
    })
}

fn row_to_record(row: &QueryResult, table_id: TableId, fields: &[Field]) -> Result<Record> {
    let id_str = row.try_get::<String>("", system_columns::ID).map_err(db_error)?;
    let id = RecordId::parse(&id_str).map_err(|err| Error::Database { message: err.to_string(), source: None })?;
    let version = row.try_get::<i64>("", system_columns::VERSION).map_err(db_error)?;

    let mut data = BTreeMap::new();
    for field in fields {
        let value = value_to_cell(row, &field.db_field_name, field.db_field_type)?;
        data.insert(field.id, value);
    }

    Ok(Record {
        id,
        table_id,
        auto_number: row.try_get::<i64>("", system_columns::AUTO_NUMBER).map_err(db_error)?,
        created_time: row.try_get::<DateTime<Utc>>("", system_columns::CREATED_TIME).map_err(db_error)?,
        last_modified_time: row
            .try_get::<Option<DateTime<Utc>>>("", system_columns::LAST_MODIFIED_TIME)
            .map_err(db_error)?,
        created_by: row.try_get::<String>("", system_columns::CREATED_BY).map_err(db_error)?,
        last_modified_by: row
            .try_get::<Option<String>>("", system_columns::LAST_MODIFIED_BY)
            .map_err(db_error)?,
        version,
        data,
    })
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn create_record(&self, tx: &dyn Transaction, table_id: TableId, record: &Record) -> Result<Record> {
        let conn = connection_of(tx)?;
        let layout = self.layout(table_id).await?;

        let mut columns = vec![
            system_columns::ID.to_owned(),
            system_columns::CREATED_BY.to_owned(),
            system_columns::VERSION.to_owned(),
        ];
        let mut values: Vec<Value> = vec![
            record.id.to_string().into(),
            record.created_by.clone().into(),
            Value::BigInt(Some(1)),
        ];
        for field in &layout.fields {
            if field.field_type.is_virtual() {
                continue;
            }
            columns.push(quote_ident(&field.db_field_name));
            values.push(cell_to_value(&record.get(&field.id), field.db_field_type)?);
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            layout.db_table_name,
            columns.join(", "),
            placeholders.join(", ")
        );
        let row = conn
            .query_one(Statement::from_sql_and_values(conn.get_database_backend(), sql, values))
            .await
            .map_err(db_error)?
            .ok_or_else(|| Error::database("insert returned no row"))?;
        row_to_record(&row, table_id, &layout.fields)
    }

    async fn find_record(&self, table_id: TableId, record_id: RecordId) -> Result<Option<Record>> {
        let layout = self.layout(table_id).await?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1",
            layout.db_table_name,
            quote_ident(system_columns::ID)
        );
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(self.backend(), sql, vec![record_id.to_string().into()]))
            .await
            .map_err(db_error)?;
        row.map(|row| row_to_record(&row, table_id, &layout.fields)).transpose()
    }

    async fn list_records(&self, table_id: TableId, offset: i64, limit: i64) -> Result<RecordPage> {
        if offset > LARGE_OFFSET_WARNING_THRESHOLD {
            warn!(table_id = %table_id, offset, "large offset pagination; prefer a cursor");
        }
        let layout = self.layout(table_id).await?;
        let sql = format!(
            "SELECT * FROM {} ORDER BY {} LIMIT $1 OFFSET $2",
            layout.db_table_name,
            quote_ident(system_columns::AUTO_NUMBER)
        );
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(self.backend(), sql, vec![limit.into(), offset.into()]))
            .await
            .map_err(db_error)?;
        let records = rows
            .iter()
            .map(|row| row_to_record(row, table_id, &layout.fields))
            .collect::<Result<Vec<_>>>()?;

        let count_sql = format!("SELECT COUNT(*) AS total FROM {}", layout.db_table_name);
        let count_row = self
            .db
            .query_one(Statement::from_string(self.backend(), count_sql))
            .await
            .map_err(db_error)?;
        let total_count = count_row.map(|row| row.try_get::<i64>("", "total")).transpose().map_err(db_error)?;

        Ok(RecordPage { records, total_count })
    }

    async fn update_record(
        &self,
        tx: &dyn Transaction,
        table_id: TableId,
        record_id: RecordId,
        changes: &BTreeMap<FieldId, CellValue>,
        expected_version: i64,
    ) -> Result<Record> {
        let conn = connection_of(tx)?;
        let layout = self.layout(table_id).await?;
        let fields_by_id: BTreeMap<FieldId, &Field> = layout.fields.iter().map(|f| (f.id, f)).collect();

        let mut set_clauses = vec![format!("{} = now()", quote_ident(system_columns::LAST_MODIFIED_TIME))];
        let mut values: Vec<Value> = Vec::new();
        let mut idx = 1;
        for (field_id, cell) in changes {
            let Some(field) = fields_by_id.get(field_id) else {
                continue;
            };
            set_clauses.push(format!("{} = ${idx}", quote_ident(&field.db_field_name)));
            values.push(cell_to_value(cell, field.db_field_type)?);
            idx += 1;
        }

        let new_version = expected_version + 1;
        values.push(Value::BigInt(Some(new_version)));
        set_clauses.push(format!("{} = ${idx}", quote_ident(system_columns::VERSION)));
        idx += 1;

        values.push(record_id.to_string().into());
        let id_placeholder = idx;
        idx += 1;
        values.push(Value::BigInt(Some(expected_version)));
        let expected_placeholder = idx;

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${id_placeholder} AND {} = ${expected_placeholder} RETURNING *",
            layout.db_table_name,
            set_clauses.join(", "),
            quote_ident(system_columns::ID),
            quote_ident(system_columns::VERSION),
        );

        let row = conn
            .query_one(Statement::from_sql_and_values(conn.get_database_backend(), sql, values))
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => row_to_record(&row, table_id, &layout.fields),
            None => {
                let current = self.find_record(table_id, record_id).await?;
                match current {
                    None => Err(Error::not_found("record", record_id.to_string())),
                    Some(current) => Err(Error::version_conflict(expected_version, current.version)),
                }
            }
        }
    }

    async fn delete_record(&self, tx: &dyn Transaction, table_id: TableId, record_id: RecordId) -> Result<()> {
        let conn = connection_of(tx)?;
        let layout = self.layout(table_id).await?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            layout.db_table_name,
            quote_ident(system_columns::ID)
        );
        conn.execute(Statement::from_sql_and_values(conn.get_database_backend(), sql, vec![record_id.to_string().into()]))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn batch_update_link_field_title(
        &self,
        tx: &dyn Transaction,
        table_id: TableId,
        field_id: FieldId,
        record_id: RecordId,
        new_title: Option<String>,
    ) -> Result<u64> {
        let conn = connection_of(tx)?;
        let layout = self.layout(table_id).await?;
        let field = layout
            .fields
            .iter()
            .find(|f| f.id == field_id)
            .ok_or_else(|| Error::not_found("field", field_id.to_string()))?;
        let col = quote_ident(&field.db_field_name);

        let object_sql = format!(
            "UPDATE {} SET {col} = jsonb_set({col}, '{{title}}', to_jsonb($2::text), true)
             WHERE jsonb_typeof({col}) = 'object' AND {col}->>'id' = $1",
            layout.db_table_name
        );
        let array_sql = format!(
            "UPDATE {} SET {col} = (
                SELECT jsonb_agg(
                    CASE WHEN elem->>'id' = $1
                         THEN jsonb_set(elem, '{{title}}', to_jsonb($2::text), true)
                         ELSE elem END
                )
                FROM jsonb_array_elements({col}) AS elem
             )
             WHERE jsonb_typeof({col}) = 'array'
               AND EXISTS (SELECT 1 FROM jsonb_array_elements({col}) AS e WHERE e->>'id' = $1)",
            layout.db_table_name
        );

        let id_value: Value = record_id.to_string().into();
        let title_value: Value = new_title.clone().into();

        let object_result = self
            .db
            .execute(Statement::from_sql_and_values(
                self.backend(),
                object_sql,
                vec![id_value.clone(), title_value.clone()],
            ))
            .await
            .map_err(db_error)?;
        let array_result = self
            .db
            .execute(Statement::from_sql_and_values(self.backend(), array_sql, vec![id_value, title_value]))
            .await
            .map_err(db_error)?;

        Ok(object_result.rows_affected() + array_result.rows_affected())
    }

    async fn find_records_by_link_value(
        &self,
        table_id: TableId,
        field_id: FieldId,
        linked_ids: &[RecordId],
    ) -> Result<Vec<Record>> {
        if linked_ids.is_empty() {
            return Ok(Vec::new());
        }
        let layout = self.layout(table_id).await?;
        let field = layout
            .fields
            .iter()
            .find(|f| f.id == field_id)
            .ok_or_else(|| Error::not_found("field", field_id.to_string()))?;
        let col = quote_ident(&field.db_field_name);
        let needs_cast = field.db_field_type != ColumnType::Jsonb;

        let mut clauses = Vec::with_capacity(linked_ids.len());
        let mut values: Vec<Value> = Vec::with_capacity(linked_ids.len());
        for (i, id) in linked_ids.iter().enumerate() {
            let idx = i + 1;
            let expr = if needs_cast {
                format!(
                    "(CASE WHEN {col} IS NULL THEN false ELSE \
                     (CAST({col} AS jsonb) @> jsonb_build_array(jsonb_build_object('id', ${idx}::text))) \
                     OR (CAST({col} AS jsonb)->>'id' = ${idx}::text) END)"
                )
            } else {
                format!(
                    "({col} @> jsonb_build_array(jsonb_build_object('id', ${idx}::text)) \
                     OR {col}->>'id' = ${idx}::text)"
                )
            };
            clauses.push(expr);
            values.push(id.to_string().into());
        }

        let sql = format!("SELECT * FROM {} WHERE {}", layout.db_table_name, clauses.join(" OR "));
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(self.backend(), sql, values))
            .await
            .map_err(db_error)?;
        rows.iter().map(|row| row_to_record(row, table_id, &layout.fields)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_to_value_text_round_trips_plain_text() {
        let v = cell_to_value(&CellValue::Text("hello".into()), ColumnType::Text).unwrap();
        assert_eq!(v, Value::String(Some(Box::new("hello".to_owned()))));
    }

    #[test]
    fn cell_to_value_text_null_is_sql_null() {
        let v = cell_to_value(&CellValue::Null, ColumnType::Text).unwrap();
        assert_eq!(v, Value::String(None));
    }

    #[test]
    fn cell_to_value_varchar_behaves_like_text() {
        let v = cell_to_value(&CellValue::Text("short".into()), ColumnType::Varchar).unwrap();
        assert_eq!(v, Value::String(Some(Box::new("short".to_owned()))));
    }

    #[test]
    fn cell_to_value_text_column_serializes_non_text_cells() {
        let v = cell_to_value(&CellValue::Number(42.0), ColumnType::Text).unwrap();
        assert_eq!(v, Value::String(Some(Box::new("42.0".to_owned()))));
    }

    #[test]
    fn cell_to_value_boolean_coerces_non_bool_by_emptiness() {
        let v = cell_to_value(&CellValue::Text("x".into()), ColumnType::Boolean).unwrap();
        assert_eq!(v, Value::Bool(Some(true)));
        let v = cell_to_value(&CellValue::Null, ColumnType::Boolean).unwrap();
        assert_eq!(v, Value::Bool(None));
    }

    #[test]
    fn cell_to_value_jsonb_preserves_structure() {
        let v = cell_to_value(&CellValue::Number(3.5), ColumnType::Jsonb).unwrap();
        assert_eq!(v, Value::Json(Some(Box::new(serde_json::json!(3.5)))));
    }

    #[test]
    fn cell_to_value_serial_always_null() {
        let v = cell_to_value(&CellValue::Number(9.0), ColumnType::Serial).unwrap();
        assert_eq!(v, Value::BigInt(None));
    }

    #[test]
    fn cell_to_value_integer_round_trips_version() {
        let v = cell_to_value(&CellValue::Number(4.0), ColumnType::Integer).unwrap();
        assert_eq!(v, Value::BigInt(Some(4)));
        let v = cell_to_value(&CellValue::Null, ColumnType::Integer).unwrap();
        assert_eq!(v, Value::BigInt(None));
    }
}
