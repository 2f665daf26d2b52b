//! A View: a named saved filter/sort/group over a Table.
//!
//! Behavior (filter/sort/group evaluation) is out of core scope per spec
//! §3; only the persisted shape and soft-delete lifecycle live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::value_objects::{TableId, ViewId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: ViewId,
    pub table_id: TableId,
    pub name: String,
    pub view_type: String,
    pub filter: Option<Json>,
    pub sort: Option<Json>,
    pub group: Option<Json>,
    pub column_meta: Option<Json>,
    pub options: Option<Json>,
    pub order: f64,
    /// Present and unique-where-not-null when the view is share-linked.
    pub share_id: Option<String>,
    pub deleted_time: Option<DateTime<Utc>>,
}

impl View {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_time.is_some()
    }
}
