//! A Base: an isolated tenancy unit owning exactly one SQL schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::BaseId;

/// An isolated tenancy unit. Owns the SQL schema named `bse_<id>`
/// (see [`crate::schema::base_schema_name`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base {
    /// Primary identifier.
    pub id: BaseId,
    /// Owning space (out-of-core tenancy grouping; opaque string here).
    pub space_id: String,
    /// Display name.
    pub name: String,
    /// Ordering key among sibling Bases.
    pub order: f64,
    /// Optional access password hash; `None` means no extra gate.
    pub schema_pass: Option<String>,
    pub created_by: String,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: Option<DateTime<Utc>>,
    /// Soft-delete marker; `Some` means the catalog row is tombstoned
    /// (the physical schema has already been dropped by then).
    pub deleted_time: Option<DateTime<Utc>>,
}

impl Base {
    /// `true` if this row has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_time.is_some()
    }
}
