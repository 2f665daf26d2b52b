//! Domain events emitted by the Transactional Event Bus (spec §4.8) and
//! fanned out by the Pub/Sub Broker (spec §4.9) after commit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value_objects::{CellValue, FieldId, RecordId, TableId};

/// The shape fixed by spec §4.8: `{eventType, tableId, recordId, fields,
/// userId, oldVersion, newVersion}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordEvent {
    Create {
        table_id: TableId,
        record_id: RecordId,
        /// Full post-image.
        fields: BTreeMap<FieldId, CellValue>,
        user_id: String,
        new_version: i64,
    },
    Update {
        table_id: TableId,
        record_id: RecordId,
        fields: BTreeMap<FieldId, CellValue>,
        user_id: String,
        old_version: i64,
        new_version: i64,
    },
    Delete {
        table_id: TableId,
        record_id: RecordId,
        user_id: String,
        old_version: i64,
    },
}

impl RecordEvent {
    #[must_use]
    pub fn table_id(&self) -> TableId {
        match self {
            Self::Create { table_id, .. }
            | Self::Update { table_id, .. }
            | Self::Delete { table_id, .. } => *table_id,
        }
    }

    #[must_use]
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Create { record_id, .. }
            | Self::Update { record_id, .. }
            | Self::Delete { record_id, .. } => *record_id,
        }
    }

    /// The pub/sub channel name this event fans out on, spec §4.9/§6:
    /// `sharedb:rec_<tableId>.<recordId>`.
    #[must_use]
    pub fn channel(&self) -> String {
        format!("sharedb:rec_{}.{}", self.table_id(), self.record_id())
    }

    /// Version used for at-least-once-plus-dedup semantics (spec §8,
    /// invariant 4): subscribers drop an event whose `new_version` is not
    /// greater than the last one they observed for this record.
    #[must_use]
    pub fn new_version(&self) -> Option<i64> {
        match self {
            Self::Create { new_version, .. } | Self::Update { new_version, .. } => {
                Some(*new_version)
            }
            Self::Delete { .. } => None,
        }
    }
}

/// Lifecycle state of a managed background service (event bus, pub/sub
/// subscriber loop), used for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Starting,
    Running,
    Stopping,
    Stopped,
}
