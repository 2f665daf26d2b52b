//! Orchestrates Link field lifecycle on top of [`LinkEngine`]: wiring a
//! new link's symmetric peer into the dependency graph (so Lookup/Rollup
//! fields built on top of it recompute correctly) and propagating
//! cardinality changes.
//!
//! Every method opens its own transaction around the `LinkEngine` call
//! it wraps, committing on success and rolling back on failure, so a
//! cardinality migration or a bulk link/unlink never leaves some
//! records rewritten and others not.

use std::sync::Arc;

use gridbase_domain::entities::{DependencyType, Field, Relationship};
use gridbase_domain::error::Result;
use gridbase_domain::ports::dependency_graph::{DependencyEdge, DependencyGraphBuilder};
use gridbase_domain::ports::link_engine::LinkEngine;
use gridbase_domain::ports::transaction::TransactionManager;
use gridbase_domain::value_objects::{FieldId, RecordId, TableId};

pub struct LinkFieldService {
    link_engine: Arc<dyn LinkEngine>,
    dependency_graph: Arc<dyn DependencyGraphBuilder>,
    transactions: Arc<dyn TransactionManager>,
}

impl LinkFieldService {
    #[must_use]
    pub fn new(
        link_engine: Arc<dyn LinkEngine>,
        dependency_graph: Arc<dyn DependencyGraphBuilder>,
        transactions: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            link_engine,
            dependency_graph,
            transactions,
        }
    }

    /// Create both sides of a link relationship. Neither side has
    /// dependents yet — Lookup/Rollup fields register their own edges
    /// against the new field id when they are created on top of it.
    pub async fn create_link_field(
        &self,
        table_id: TableId,
        linked_table_id: TableId,
        relationship: Relationship,
        field_name: &str,
    ) -> Result<(Field, Field)> {
        let tx = self.transactions.begin().await?;
        match self.link_engine.create_link_field(tx.as_ref(), table_id, linked_table_id, relationship, field_name).await
        {
            Ok(fields) => {
                self.transactions.commit(tx).await?;
                Ok(fields)
            }
            Err(err) => {
                self.transactions.rollback(tx).await?;
                Err(err)
            }
        }
    }

    pub async fn migrate_cardinality(&self, field_id: FieldId, new_relationship: Relationship) -> Result<()> {
        let tx = self.transactions.begin().await?;
        match self.link_engine.migrate_cardinality(tx.as_ref(), field_id, new_relationship).await {
            Ok(()) => self.transactions.commit(tx).await,
            Err(err) => {
                self.transactions.rollback(tx).await?;
                Err(err)
            }
        }
    }

    pub async fn link_records(&self, field_id: FieldId, record_id: RecordId, target_ids: &[RecordId]) -> Result<()> {
        let tx = self.transactions.begin().await?;
        match self.link_engine.link_records(tx.as_ref(), field_id, record_id, target_ids).await {
            Ok(()) => self.transactions.commit(tx).await,
            Err(err) => {
                self.transactions.rollback(tx).await?;
                Err(err)
            }
        }
    }

    pub async fn unlink_records(&self, field_id: FieldId, record_id: RecordId, target_ids: &[RecordId]) -> Result<()> {
        let tx = self.transactions.begin().await?;
        match self.link_engine.unlink_records(tx.as_ref(), field_id, record_id, target_ids).await {
            Ok(()) => self.transactions.commit(tx).await,
            Err(err) => {
                self.transactions.rollback(tx).await?;
                Err(err)
            }
        }
    }

    /// Register a Lookup/Rollup field's dependency on the link field it
    /// reads through, plus the source field on the far side of the
    /// link. Both edges matter: a change to the link itself (record
    /// re-linked) or to the looked-up field's value must both trigger
    /// recomputation.
    pub async fn register_derived_field(
        &self,
        derived_field_id: FieldId,
        link_field_id: FieldId,
        source_field_id: FieldId,
        dependency_type: DependencyType,
    ) -> Result<()> {
        self.dependency_graph
            .set_dependencies(
                derived_field_id,
                vec![
                    DependencyEdge {
                        source_field_id: link_field_id,
                        dependent_field_id: derived_field_id,
                        dependency_type,
                    },
                    DependencyEdge {
                        source_field_id,
                        dependent_field_id: derived_field_id,
                        dependency_type,
                    },
                ],
            )
            .await
    }

    pub async fn delete_link_field(&self, field_id: FieldId) -> Result<()> {
        self.dependency_graph.remove_field(field_id).await?;
        let tx = self.transactions.begin().await?;
        match self.link_engine.delete_link_field(tx.as_ref(), field_id).await {
            Ok(()) => self.transactions.commit(tx).await,
            Err(err) => {
                self.transactions.rollback(tx).await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::services::PetgraphDependencyGraph;
    use crate::use_cases::test_support::{FakeLinkEngine, FakeTransactionManager};

    use super::*;

    fn service(link_engine: Arc<FakeLinkEngine>, dependency_graph: Arc<PetgraphDependencyGraph>) -> LinkFieldService {
        LinkFieldService::new(link_engine, dependency_graph, Arc::new(FakeTransactionManager::new()))
    }

    #[tokio::test]
    async fn create_link_field_commits_on_success() {
        let svc = service(Arc::new(FakeLinkEngine::new()), Arc::new(PetgraphDependencyGraph::new()));
        let (owner, peer) = svc
            .create_link_field(TableId::new(), TableId::new(), Relationship::ManyOne, "linked")
            .await
            .unwrap();
        assert_eq!(owner.field_type, gridbase_domain::entities::FieldType::Link);
        assert_eq!(peer.field_type, gridbase_domain::entities::FieldType::Link);
    }

    #[tokio::test]
    async fn create_link_field_rolls_back_and_propagates_engine_failure() {
        let svc = service(Arc::new(FakeLinkEngine::failing()), Arc::new(PetgraphDependencyGraph::new()));
        let err = svc
            .create_link_field(TableId::new(), TableId::new(), Relationship::ManyOne, "linked")
            .await
            .unwrap_err();
        assert!(matches!(err, gridbase_domain::error::Error::Database { .. }));
    }

    #[tokio::test]
    async fn register_derived_field_wires_both_edges() {
        let dependency_graph = Arc::new(PetgraphDependencyGraph::new());
        let svc = service(Arc::new(FakeLinkEngine::new()), dependency_graph.clone());

        let table_id = TableId::new();
        let link_field_id = FieldId::new();
        let source_field_id = FieldId::new();
        let rollup_field_id = FieldId::new();

        svc.register_derived_field(rollup_field_id, link_field_id, source_field_id, DependencyType::Rollup)
            .await
            .unwrap();

        let order = dependency_graph
            .recomputation_order(table_id, &[link_field_id])
            .await
            .unwrap();
        assert_eq!(order, vec![rollup_field_id]);

        let order = dependency_graph
            .recomputation_order(table_id, &[source_field_id])
            .await
            .unwrap();
        assert_eq!(order, vec![rollup_field_id]);
    }

    #[tokio::test]
    async fn link_records_and_unlink_records_forward_to_the_engine() {
        let link_engine = Arc::new(FakeLinkEngine::new());
        let svc = service(link_engine.clone(), Arc::new(PetgraphDependencyGraph::new()));

        let field_id = FieldId::new();
        let record_id = RecordId::new();
        let target_id = RecordId::new();

        svc.link_records(field_id, record_id, &[target_id]).await.unwrap();
        svc.unlink_records(field_id, record_id, &[target_id]).await.unwrap();

        assert_eq!(*link_engine.link_calls.lock().unwrap(), vec![(field_id, record_id, vec![target_id])]);
        assert_eq!(*link_engine.unlink_calls.lock().unwrap(), vec![(field_id, record_id, vec![target_id])]);
    }

    #[tokio::test]
    async fn delete_link_field_removes_dependency_edges_even_if_the_engine_call_fails() {
        let dependency_graph = Arc::new(PetgraphDependencyGraph::new());
        let link_field_id = FieldId::new();
        let derived_field_id = FieldId::new();
        dependency_graph
            .set_dependencies(
                derived_field_id,
                vec![gridbase_domain::ports::dependency_graph::DependencyEdge {
                    source_field_id: link_field_id,
                    dependent_field_id: derived_field_id,
                    dependency_type: DependencyType::Link,
                }],
            )
            .await
            .unwrap();

        let svc = service(Arc::new(FakeLinkEngine::failing()), dependency_graph.clone());
        let err = svc.delete_link_field(link_field_id).await.unwrap_err();
        assert!(matches!(err, gridbase_domain::error::Error::Database { .. }));

        let order = dependency_graph.recomputation_order(TableId::new(), &[link_field_id]).await.unwrap();
        assert!(order.is_empty());
    }
}
