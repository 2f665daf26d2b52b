//! A Field Dependency Edge: a directed edge in the per-table (and, for
//! cross-table links, cross-table) field DAG.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::value_objects::FieldId;

/// The kind of dependency an edge represents, spec §4.6's edge
/// construction rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Formula,
    Rollup,
    Lookup,
    Count,
    Link,
}

/// A directed edge `source_field_id -> dependent_field_id`: the dependent
/// field must be recomputed whenever the source field changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDependencyEdge {
    pub source_field_id: FieldId,
    pub dependent_field_id: FieldId,
    pub dependency_type: DependencyType,
    pub created_time: DateTime<Utc>,
}
