//! Petgraph-backed implementation of [`DependencyGraphBuilder`].
//!
//! One graph spans every table in a base: Lookup and Rollup fields
//! create edges that cross table boundaries by design (a lookup field
//! depends on a field on the table at the far end of its link), so
//! partitioning the graph per table would lose those edges. `table_id`
//! in [`recomputation_order`](DependencyGraphBuilder::recomputation_order)
//! is accepted for the caller's bookkeeping but does not further
//! restrict the traversal — reachability from the changed fields is
//! the only scoping rule.

use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;

use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::dependency_graph::{DependencyEdge, DependencyGraphBuilder};
use gridbase_domain::value_objects::{FieldId, TableId};

/// Thread-safe, mutable dependency DAG shared across every use case
/// that mutates or reads field dependencies.
pub struct PetgraphDependencyGraph {
    graph: RwLock<DiGraph<FieldId, gridbase_domain::entities::DependencyType>>,
    nodes: DashMap<FieldId, NodeIndex>,
}

impl PetgraphDependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            nodes: DashMap::new(),
        }
    }

    fn node_for(
        graph: &mut DiGraph<FieldId, gridbase_domain::entities::DependencyType>,
        nodes: &DashMap<FieldId, NodeIndex>,
        field_id: FieldId,
    ) -> NodeIndex {
        if let Some(idx) = nodes.get(&field_id) {
            return *idx;
        }
        let idx = graph.add_node(field_id);
        nodes.insert(field_id, idx);
        idx
    }
}

impl Default for PetgraphDependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DependencyGraphBuilder for PetgraphDependencyGraph {
    async fn set_dependencies(
        &self,
        dependent_field_id: FieldId,
        edges: Vec<DependencyEdge>,
    ) -> Result<()> {
        let mut graph = self
            .graph
            .write()
            .map_err(|_| Error::Internal { message: "dependency graph lock poisoned".into() })?;

        let dependent_idx = Self::node_for(&mut graph, &self.nodes, dependent_field_id);

        // Replace this field's existing incoming edges wholesale: drop
        // every edge currently pointing at it, then re-add the fresh
        // set the caller supplied.
        let stale: Vec<_> = graph
            .edges_directed(dependent_idx, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        for edge_id in stale {
            graph.remove_edge(edge_id);
        }

        let mut added = Vec::with_capacity(edges.len());
        for edge in &edges {
            debug_assert_eq!(edge.dependent_field_id, dependent_field_id);
            let source_idx = Self::node_for(&mut graph, &self.nodes, edge.source_field_id);
            let edge_idx = graph.add_edge(source_idx, dependent_idx, edge.dependency_type);
            added.push(edge_idx);
        }

        if is_cyclic_directed(&*graph) {
            for edge_idx in added {
                graph.remove_edge(edge_idx);
            }
            return Err(Error::Computation {
                field_id: dependent_field_id.to_string(),
                message: "adding these dependencies would create a cycle".into(),
            });
        }

        Ok(())
    }

    async fn remove_field(&self, field_id: FieldId) -> Result<()> {
        let mut graph = self
            .graph
            .write()
            .map_err(|_| Error::Internal { message: "dependency graph lock poisoned".into() })?;
        if let Some((_, idx)) = self.nodes.remove(&field_id) {
            graph.remove_node(idx);
        }
        Ok(())
    }

    async fn recomputation_order(
        &self,
        _table_id: TableId,
        changed_field_ids: &[FieldId],
    ) -> Result<Vec<FieldId>> {
        let graph = self
            .graph
            .read()
            .map_err(|_| Error::Internal { message: "dependency graph lock poisoned".into() })?;

        let mut reachable = std::collections::HashSet::new();
        for &field_id in changed_field_ids {
            let Some(start) = self.nodes.get(&field_id).map(|r| *r) else {
                continue;
            };
            let mut dfs = Dfs::new(&*graph, start);
            while let Some(node) = dfs.next(&*graph) {
                reachable.insert(node);
            }
        }

        let order = toposort(&*graph, None).map_err(|_| Error::Computation {
            field_id: "unknown".into(),
            message: "dependency graph contains a cycle".into(),
        })?;

        Ok(order
            .into_iter()
            .filter(|idx| reachable.contains(idx))
            .map(|idx| graph[idx])
            .collect())
    }

    async fn direct_dependents(&self, field_id: FieldId) -> Result<Vec<FieldId>> {
        let graph = self
            .graph
            .read()
            .map_err(|_| Error::Internal { message: "dependency graph lock poisoned".into() })?;
        let Some(idx) = self.nodes.get(&field_id).map(|r| *r) else {
            return Ok(Vec::new());
        };
        Ok(graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| graph[n])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbase_domain::entities::DependencyType;

    fn edge(source: FieldId, dependent: FieldId) -> DependencyEdge {
        DependencyEdge {
            source_field_id: source,
            dependent_field_id: dependent,
            dependency_type: DependencyType::Formula,
        }
    }

    #[tokio::test]
    async fn orders_a_simple_chain() {
        let g = PetgraphDependencyGraph::new();
        let a = FieldId::new();
        let b = FieldId::new();
        let c = FieldId::new();

        g.set_dependencies(b, vec![edge(a, b)]).await.unwrap();
        g.set_dependencies(c, vec![edge(b, c)]).await.unwrap();

        let order = g.recomputation_order(TableId::new(), &[a]).await.unwrap();
        assert_eq!(order, vec![b, c]);
    }

    #[tokio::test]
    async fn rejects_a_cycle() {
        let g = PetgraphDependencyGraph::new();
        let a = FieldId::new();
        let b = FieldId::new();

        g.set_dependencies(b, vec![edge(a, b)]).await.unwrap();
        let err = g.set_dependencies(a, vec![edge(b, a)]).await.unwrap_err();
        assert!(matches!(err, Error::Computation { .. }));
    }

    #[tokio::test]
    async fn remove_field_drops_its_edges() {
        let g = PetgraphDependencyGraph::new();
        let a = FieldId::new();
        let b = FieldId::new();
        g.set_dependencies(b, vec![edge(a, b)]).await.unwrap();
        g.remove_field(b).await.unwrap();
        assert!(g.direct_dependents(a).await.unwrap().is_empty());
    }
}
