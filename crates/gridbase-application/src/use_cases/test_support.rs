//! In-memory fakes for the ports `record_service` and
//! `link_field_service` orchestrate, shared by both modules' test
//! suites. Only `#[cfg(test)]`-compiled; never linked into the real
//! binary.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use gridbase_domain::entities::{Base, Field, FieldOptions, FieldType, Record, Relationship, Table, View};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::events::RecordEvent;
use gridbase_domain::ports::event_bus::TransactionalEventBus;
use gridbase_domain::ports::link_engine::LinkEngine;
use gridbase_domain::ports::metadata_store::MetadataStore;
use gridbase_domain::ports::record_store::{RecordPage, RecordStore};
use gridbase_domain::ports::transaction::{Transaction, TransactionManager};
use gridbase_domain::value_objects::{BaseId, CellValue, FieldId, RecordId, TableId, ViewId};

/// Marker transaction — the fakes have no connection to downcast to,
/// so every provider call that takes `&dyn Transaction` just ignores
/// it.
pub struct FakeTx;

impl Transaction for FakeTx {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Default)]
pub struct FakeTransactionManager;

#[async_trait]
impl TransactionManager for FakeTransactionManager {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(FakeTx))
    }

    async fn commit(&self, _tx: Box<dyn Transaction>) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self, _tx: Box<dyn Transaction>) -> Result<()> {
        Ok(())
    }
}

/// In-memory substitute for a table's physical rows, keyed the same
/// way the real Postgres-backed store scopes its queries.
#[derive(Default)]
pub struct FakeRecordStore {
    rows: Mutex<HashMap<(TableId, RecordId), Record>>,
}

impl FakeRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: Record) {
        self.rows.lock().unwrap().insert((record.table_id, record.id), record);
    }

    pub fn get(&self, table_id: TableId, record_id: RecordId) -> Option<Record> {
        self.rows.lock().unwrap().get(&(table_id, record_id)).cloned()
    }
}

#[async_trait]
impl RecordStore for FakeRecordStore {
    async fn create_record(&self, _tx: &dyn Transaction, table_id: TableId, record: &Record) -> Result<Record> {
        let mut stored = record.clone();
        stored.table_id = table_id;
        self.rows.lock().unwrap().insert((table_id, stored.id), stored.clone());
        Ok(stored)
    }

    async fn find_record(&self, table_id: TableId, record_id: RecordId) -> Result<Option<Record>> {
        Ok(self.rows.lock().unwrap().get(&(table_id, record_id)).cloned())
    }

    async fn list_records(&self, table_id: TableId, offset: i64, limit: i64) -> Result<RecordPage> {
        let rows = self.rows.lock().unwrap();
        let mut records: Vec<Record> = rows.values().filter(|r| r.table_id == table_id).cloned().collect();
        records.sort_by_key(|r| r.auto_number);
        let total_count = Some(records.len() as i64);
        let page = records.into_iter().skip(offset.max(0) as usize).take(limit.max(0) as usize).collect();
        Ok(RecordPage { records: page, total_count })
    }

    async fn update_record(
        &self,
        _tx: &dyn Transaction,
        table_id: TableId,
        record_id: RecordId,
        changes: &BTreeMap<FieldId, CellValue>,
        expected_version: i64,
    ) -> Result<Record> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows
            .get_mut(&(table_id, record_id))
            .ok_or_else(|| Error::not_found("record", record_id.to_string()))?;
        if record.version != expected_version {
            return Err(Error::version_conflict(expected_version, record.version));
        }
        for (field_id, value) in changes {
            record.set(*field_id, value.clone());
        }
        record.version += 1;
        record.last_modified_time = Some(chrono::Utc::now());
        Ok(record.clone())
    }

    async fn delete_record(&self, _tx: &dyn Transaction, table_id: TableId, record_id: RecordId) -> Result<()> {
        self.rows.lock().unwrap().remove(&(table_id, record_id));
        Ok(())
    }

    async fn batch_update_link_field_title(
        &self,
        _tx: &dyn Transaction,
        _table_id: TableId,
        _field_id: FieldId,
        _record_id: RecordId,
        _new_title: Option<String>,
    ) -> Result<u64> {
        Ok(0)
    }

    async fn find_records_by_link_value(
        &self,
        table_id: TableId,
        field_id: FieldId,
        linked_ids: &[RecordId],
    ) -> Result<Vec<Record>> {
        let wanted: Vec<String> = linked_ids.iter().map(RecordId::to_string).collect();
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|r| r.table_id == table_id)
            .filter(|r| r.get(&field_id).link_ids().iter().any(|id| wanted.contains(id)))
            .cloned()
            .collect())
    }
}

/// In-memory substitute for the catalog. Only the field-related
/// methods the use cases under test actually call are backed by real
/// storage; Base/Table/View CRUD are stubbed since nothing under test
/// touches them.
#[derive(Default)]
pub struct FakeMetadataStore {
    fields: Mutex<HashMap<FieldId, Field>>,
}

impl FakeMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_field(&self, field: Field) {
        self.fields.lock().unwrap().insert(field.id, field);
    }
}

#[async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn save_base(&self, _base: &Base) -> Result<()> {
        Ok(())
    }

    async fn find_base(&self, _id: BaseId) -> Result<Option<Base>> {
        Ok(None)
    }

    async fn soft_delete_base(&self, _id: BaseId) -> Result<()> {
        Ok(())
    }

    async fn save_table(&self, _table: &Table) -> Result<()> {
        Ok(())
    }

    async fn find_table(&self, _id: TableId) -> Result<Option<Table>> {
        Ok(None)
    }

    async fn find_tables_by_base(&self, _base_id: BaseId) -> Result<Vec<Table>> {
        Ok(Vec::new())
    }

    async fn soft_delete_table(&self, _id: TableId) -> Result<()> {
        Ok(())
    }

    async fn save_field(&self, field: &Field) -> Result<()> {
        self.fields.lock().unwrap().insert(field.id, field.clone());
        Ok(())
    }

    async fn find_field(&self, id: FieldId) -> Result<Option<Field>> {
        Ok(self.fields.lock().unwrap().get(&id).cloned())
    }

    async fn find_fields_by_table(&self, table_id: TableId) -> Result<Vec<Field>> {
        Ok(self.fields.lock().unwrap().values().filter(|f| f.table_id == table_id).cloned().collect())
    }

    async fn soft_delete_field(&self, id: FieldId) -> Result<()> {
        self.fields.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn find_link_fields_to_table(&self, table_id: TableId) -> Result<Vec<Field>> {
        Ok(self
            .fields
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.as_link_options().is_some_and(|(linked, ..)| *linked == table_id))
            .cloned()
            .collect())
    }

    async fn save_view(&self, _view: &View) -> Result<()> {
        Ok(())
    }

    async fn find_view(&self, _id: ViewId) -> Result<Option<View>> {
        Ok(None)
    }

    async fn soft_delete_view(&self, _id: ViewId) -> Result<()> {
        Ok(())
    }
}

/// Records every `link_records`/`unlink_records` call it receives so
/// tests can assert on them directly, rather than reimplementing the
/// real engine's symmetric-sync algorithm.
#[derive(Default)]
pub struct FakeLinkEngine {
    pub fail: AtomicBool,
    pub link_calls: Mutex<Vec<(FieldId, RecordId, Vec<RecordId>)>>,
    pub unlink_calls: Mutex<Vec<(FieldId, RecordId, Vec<RecordId>)>>,
}

impl FakeLinkEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Self::default()
        }
    }
}

#[async_trait]
impl LinkEngine for FakeLinkEngine {
    async fn create_link_field(
        &self,
        _tx: &dyn Transaction,
        table_id: TableId,
        linked_table_id: TableId,
        relationship: Relationship,
        field_name: &str,
    ) -> Result<(Field, Field)> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::database("link engine unavailable"));
        }
        let owner = test_field(
            table_id,
            FieldType::Link,
            FieldOptions::Link {
                linked_table_id,
                relationship,
                symmetric_field_id: None,
                lookup_field_id: None,
                fk_host_column: None,
                is_one_way: false,
                filter_by_view_id: None,
                visible_field_ids: Vec::new(),
            },
            field_name,
        );
        let peer = test_field(
            linked_table_id,
            FieldType::Link,
            FieldOptions::Link {
                linked_table_id: table_id,
                relationship: relationship.symmetric(),
                symmetric_field_id: Some(owner.id),
                lookup_field_id: None,
                fk_host_column: None,
                is_one_way: false,
                filter_by_view_id: None,
                visible_field_ids: Vec::new(),
            },
            field_name,
        );
        Ok((owner, peer))
    }

    async fn migrate_cardinality(&self, _tx: &dyn Transaction, _field_id: FieldId, _new_relationship: Relationship) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::database("link engine unavailable"));
        }
        Ok(())
    }

    async fn link_records(
        &self,
        _tx: &dyn Transaction,
        field_id: FieldId,
        record_id: RecordId,
        target_ids: &[RecordId],
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::database("link engine unavailable"));
        }
        self.link_calls.lock().unwrap().push((field_id, record_id, target_ids.to_vec()));
        Ok(())
    }

    async fn unlink_records(
        &self,
        _tx: &dyn Transaction,
        field_id: FieldId,
        record_id: RecordId,
        target_ids: &[RecordId],
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::database("link engine unavailable"));
        }
        self.unlink_calls.lock().unwrap().push((field_id, record_id, target_ids.to_vec()));
        Ok(())
    }

    async fn delete_link_field(&self, _tx: &dyn Transaction, _field_id: FieldId) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::database("link engine unavailable"));
        }
        Ok(())
    }
}

/// Captures staged/committed events instead of fanning them out, so
/// tests can assert both on ordering (nothing published before
/// `commit`) and on content.
#[derive(Default)]
pub struct FakeEventBus {
    staged: Mutex<Vec<RecordEvent>>,
    committed: Mutex<Vec<RecordEvent>>,
}

impl FakeEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed_events(&self) -> Vec<RecordEvent> {
        self.committed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionalEventBus for FakeEventBus {
    fn stage(&self, event: RecordEvent) {
        self.staged.lock().unwrap().push(event);
    }

    async fn commit(&self) -> Result<()> {
        let mut staged = self.staged.lock().unwrap();
        self.committed.lock().unwrap().append(&mut staged);
        Ok(())
    }

    fn rollback(&self) {
        self.staged.lock().unwrap().clear();
    }
}

/// Builds a fully-populated [`Field`] for a test, since every field of
/// the struct matters to at least one code path under test.
pub fn test_field(table_id: TableId, field_type: FieldType, options: FieldOptions, name: &str) -> Field {
    let field_id = FieldId::new();
    Field {
        id: field_id,
        table_id,
        name: name.to_string(),
        field_type,
        db_field_name: format!("f_{}", field_id.as_uuid().simple()),
        db_field_type: field_type.default_column_type().unwrap_or(gridbase_domain::schema::ColumnType::Text),
        options,
        is_computed: field_type.is_virtual(),
        is_lookup: matches!(field_type, FieldType::Lookup),
        field_order: 0.0,
        is_pending: false,
        has_error: false,
        lookup_options_snapshot: None,
        created_by: "tester".into(),
        created_time: chrono::Utc::now(),
        deleted_time: None,
    }
}

/// Builds a bare [`Record`] for seeding a [`FakeRecordStore`].
pub fn test_record(table_id: TableId, version: i64, data: BTreeMap<FieldId, CellValue>) -> Record {
    Record {
        id: RecordId::new(),
        table_id,
        auto_number: 1,
        created_time: chrono::Utc::now(),
        last_modified_time: None,
        created_by: "tester".into(),
        last_modified_by: None,
        version,
        data,
    }
}
