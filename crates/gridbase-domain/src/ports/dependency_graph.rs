//! C6 — Dependency Graph port, spec §4.6.

use async_trait::async_trait;

use crate::entities::DependencyType;
use crate::error::Result;
use crate::value_objects::{FieldId, TableId};

/// A single edge `source -> dependent` with the kind of dependency it
/// represents (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub source_field_id: FieldId,
    pub dependent_field_id: FieldId,
    pub dependency_type: DependencyType,
}

/// Builds and queries the per-base field dependency DAG that drives
/// virtual field recomputation order.
#[async_trait]
pub trait DependencyGraphBuilder: Send + Sync {
    /// Register (or replace) the set of edges a virtual field depends
    /// on. Must reject the registration with
    /// [`crate::error::Error::Computation`] if adding these edges
    /// would introduce a cycle (spec §4.6's cycle-rejection
    /// invariant) — the caller's field creation/update is then rolled
    /// back.
    async fn set_dependencies(&self, dependent_field_id: FieldId, edges: Vec<DependencyEdge>) -> Result<()>;

    /// Remove every edge naming `field_id` as source or dependent,
    /// called when a field is deleted.
    async fn remove_field(&self, field_id: FieldId) -> Result<()>;

    /// Topologically sorted recomputation order for every field
    /// transitively dependent on `changed_field_ids`, scoped to one
    /// table's dependency subgraph.
    async fn recomputation_order(
        &self,
        table_id: TableId,
        changed_field_ids: &[FieldId],
    ) -> Result<Vec<FieldId>>;

    /// Direct dependents of `field_id` (one hop), used for the
    /// incremental recompute path.
    async fn direct_dependents(&self, field_id: FieldId) -> Result<Vec<FieldId>>;
}
