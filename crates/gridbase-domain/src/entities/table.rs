//! A Table: a logical table materialized as one physical table per Base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{BaseId, TableId};

/// A logical table inside a Base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub base_id: BaseId,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    /// Quoted, fully-qualified physical table name, e.g. `"bse_x"."tbl_y"`.
    pub db_table_name: String,
    /// Optimistic-lock / schema-drift counter, bumped on every DDL change
    /// (field add/drop/alter) so dependents can detect staleness cheaply.
    pub version: i64,
    pub order: f64,
    pub created_by: String,
    pub created_time: DateTime<Utc>,
    pub deleted_time: Option<DateTime<Utc>>,
}

impl Table {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_time.is_some()
    }
}
