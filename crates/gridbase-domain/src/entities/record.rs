//! A Record: a row in a Table's physical table.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{CellValue, FieldId, RecordId, TableId};

/// A row in a Table's physical table: the seven system attributes
/// (spec §3) plus one [`CellValue`] per user-defined field, keyed by
/// canonical field id (never display name — spec §4.3's "record-key
/// hygiene").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub table_id: TableId,
    /// Monotonic 64-bit integer, cluster-unique per table; backs cursor
    /// pagination (spec §4.3).
    pub auto_number: i64,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: Option<DateTime<Utc>>,
    pub created_by: String,
    pub last_modified_by: Option<String>,
    /// Optimistic-lock counter (spec invariant 3 and 7).
    pub version: i64,
    pub data: BTreeMap<FieldId, CellValue>,
}

impl Record {
    /// Get a cell's value, defaulting to [`CellValue::Null`] for fields
    /// the record has never been written with.
    #[must_use]
    pub fn get(&self, field_id: &FieldId) -> CellValue {
        self.data.get(field_id).cloned().unwrap_or(CellValue::Null)
    }

    /// Set a cell's value.
    pub fn set(&mut self, field_id: FieldId, value: CellValue) {
        self.data.insert(field_id, value);
    }

    /// Compute the set of field ids whose serialized value differs
    /// between `self` and `other` — the "deep string compare" spec §4.11
    /// step 5 permits.
    #[must_use]
    pub fn changed_fields(&self, other: &Record) -> Vec<FieldId> {
        let mut changed = Vec::new();
        let mut all_ids: Vec<FieldId> = self.data.keys().chain(other.data.keys()).copied().collect();
        all_ids.sort();
        all_ids.dedup();
        for id in all_ids {
            let a = serde_json::to_string(&self.get(&id)).unwrap_or_default();
            let b = serde_json::to_string(&other.get(&id)).unwrap_or_default();
            if a != b {
                changed.push(id);
            }
        }
        changed
    }
}
