//! C3 — Record Store port, spec §4.3.

use async_trait::async_trait;

use crate::entities::Record;
use crate::error::Result;
use crate::ports::transaction::Transaction;
use crate::value_objects::{FieldId, RecordId, TableId};

/// A page of records plus enough to decide whether more pages exist.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total_count: Option<i64>,
}

/// Reads and writes against a table's dynamic physical columns.
///
/// Every method here operates on one physical table; callers resolve
/// `table_id` to a schema/table name via [`crate::schema::SchemaProvider`]
/// before delegating (spec §4.3).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new row, system columns defaulted by the database
    /// (`__id`, `__auto_number`, `__created_time`, `version = 1`),
    /// inside `tx`. Returns the record as persisted, including
    /// generated fields.
    async fn create_record(&self, tx: &dyn Transaction, table_id: TableId, record: &Record) -> Result<Record>;

    async fn find_record(&self, table_id: TableId, record_id: RecordId) -> Result<Option<Record>>;

    /// Offset/cursor page over a table's records ordered by
    /// `__auto_number`. `offset` beyond
    /// [`crate::constants::LARGE_OFFSET_WARNING_THRESHOLD`] should be
    /// logged as a warning by the implementation (spec §5).
    async fn list_records(&self, table_id: TableId, offset: i64, limit: i64) -> Result<RecordPage>;

    /// Optimistic-locked update: `UPDATE ... SET ... WHERE __id = $1 AND
    /// version = $2`. Zero rows affected means `expected_version` is
    /// stale; implementations must surface this as
    /// [`crate::error::Error::Conflict`] via
    /// [`crate::error::Error::version_conflict`], never as a silent
    /// no-op (spec §4.3/§7).
    async fn update_record(
        &self,
        tx: &dyn Transaction,
        table_id: TableId,
        record_id: RecordId,
        changes: &std::collections::BTreeMap<FieldId, crate::value_objects::CellValue>,
        expected_version: i64,
    ) -> Result<Record>;

    async fn delete_record(&self, tx: &dyn Transaction, table_id: TableId, record_id: RecordId) -> Result<()>;

    /// Bulk rewrite of one field's denormalized `{id, title}` payload
    /// across every record holding a reference to `record_id`, spec
    /// §4.5's `BatchUpdateLinkFieldTitle` — used when a linked record's
    /// primary-field value changes and the peer side must stay in sync.
    async fn batch_update_link_field_title(
        &self,
        tx: &dyn Transaction,
        table_id: TableId,
        field_id: FieldId,
        record_id: RecordId,
        new_title: Option<String>,
    ) -> Result<u64>;

    /// Every record in `table_id` whose `field_id` Link cell references
    /// one of `linked_ids`, spec §4.3's `FindRecordsByLinkValue` —
    /// matches both the single-object and array storage shapes of a
    /// Link cell.
    async fn find_records_by_link_value(
        &self,
        table_id: TableId,
        field_id: FieldId,
        linked_ids: &[RecordId],
    ) -> Result<Vec<Record>>;
}
