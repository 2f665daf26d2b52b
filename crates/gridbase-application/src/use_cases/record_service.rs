//! C11 — Record Service: the orchestrator behind every record write,
//! spec §4.11.
//!
//! Every method here runs inside a single real database transaction:
//! the physical write, the Link Engine's peer-side sync, and the
//! virtual-field recompute all happen against the same `tx` before it
//! commits, so a failure at any step rolls every one of them back
//! together (spec §4.11/invariant 8). The event bus is only told to
//! publish after that commit succeeds, and the event it publishes
//! already carries the recomputed virtual-field values — never the
//! other way around (spec §4.8's core invariant, spec §4.7/invariant
//! 6's "subscribers see computed values" requirement). A single
//! virtual field's evaluation failure is recorded on that field
//! (`has_error`) and does not abort the write or the remaining
//! recomputations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use gridbase_domain::entities::{Field, FieldType, Record};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::events::RecordEvent;
use gridbase_domain::ports::calculation_engine::CalculationEngine;
use gridbase_domain::ports::dependency_graph::DependencyGraphBuilder;
use gridbase_domain::ports::event_bus::TransactionalEventBus;
use gridbase_domain::ports::field_kernel::FieldKernelRegistry;
use gridbase_domain::ports::link_engine::LinkEngine;
use gridbase_domain::ports::metadata_store::MetadataStore;
use gridbase_domain::ports::record_store::RecordStore;
use gridbase_domain::ports::transaction::{Transaction, TransactionManager};
use gridbase_domain::value_objects::{CellValue, FieldId, RecordId, TableId};

pub struct RecordService {
    records: Arc<dyn RecordStore>,
    metadata: Arc<dyn MetadataStore>,
    field_kernels: Arc<dyn FieldKernelRegistry>,
    dependency_graph: Arc<dyn DependencyGraphBuilder>,
    calculation_engine: Arc<dyn CalculationEngine>,
    link_engine: Arc<dyn LinkEngine>,
    event_bus: Arc<dyn TransactionalEventBus>,
    transactions: Arc<dyn TransactionManager>,
}

impl RecordService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        records: Arc<dyn RecordStore>,
        metadata: Arc<dyn MetadataStore>,
        field_kernels: Arc<dyn FieldKernelRegistry>,
        dependency_graph: Arc<dyn DependencyGraphBuilder>,
        calculation_engine: Arc<dyn CalculationEngine>,
        link_engine: Arc<dyn LinkEngine>,
        event_bus: Arc<dyn TransactionalEventBus>,
        transactions: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            records,
            metadata,
            field_kernels,
            dependency_graph,
            calculation_engine,
            link_engine,
            event_bus,
            transactions,
        }
    }

    async fn normalize(
        &self,
        fields: &[Field],
        values: BTreeMap<FieldId, CellValue>,
    ) -> Result<BTreeMap<FieldId, CellValue>> {
        let by_id: BTreeMap<_, _> = fields.iter().map(|f| (f.id, f)).collect();
        let mut normalized = BTreeMap::new();
        for (field_id, value) in values {
            let Some(field) = by_id.get(&field_id) else {
                return Err(Error::not_found("field", field_id.to_string()));
            };
            if field.field_type.is_virtual() {
                return Err(Error::validation(format!(
                    "field {field_id} is computed and cannot be written directly"
                )));
            }
            let kernel = self
                .field_kernels
                .kernel_for(field.field_type)
                .ok_or_else(|| Error::Internal {
                    message: format!("no field kernel registered for {:?}", field.field_type),
                })?;
            let normalized_value = kernel.normalize_cell(&field.options, value)?;
            normalized.insert(field_id, normalized_value);
        }
        Ok(normalized)
    }

    /// Recompute every virtual field transitively affected by writing
    /// `changed_field_ids`, in dependency order, entirely against the
    /// in-memory `record` — no extra round-trip to storage is needed
    /// since each step folds its result into the next step's working
    /// copy. Persists the accumulated results (if any) to `record.id`
    /// inside `tx` and returns them alongside the row's resulting
    /// version, so the caller can fold them into the event it stages
    /// before committing (spec §4.7/§4.11).
    async fn recompute_virtual_fields(
        &self,
        tx: &dyn Transaction,
        table_id: TableId,
        record: &Record,
        changed_field_ids: &[FieldId],
    ) -> Result<(BTreeMap<FieldId, CellValue>, i64)> {
        let order = match self.dependency_graph.recomputation_order(table_id, changed_field_ids).await {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!(%table_id, error = %err, "failed to compute recomputation order");
                return Ok((BTreeMap::new(), record.version));
            }
        };

        let mut working = record.clone();
        let mut computed = BTreeMap::new();
        for field_id in order {
            let field = match self.metadata.find_field(field_id).await {
                Ok(Some(field)) => field,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(%field_id, error = %err, "failed to load virtual field");
                    continue;
                }
            };
            match self.calculation_engine.evaluate_for_record(&working, &field).await {
                Ok(value) => {
                    working.data.insert(field_id, value.clone());
                    computed.insert(field_id, value);
                    if field.has_error {
                        let mut cleared = field;
                        cleared.has_error = false;
                        if let Err(err) = self.metadata.save_field(&cleared).await {
                            tracing::warn!(%field_id, error = %err, "failed to clear field error flag");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(%field_id, error = %err, "virtual field evaluation failed");
                    if !field.has_error {
                        let mut errored = field;
                        errored.has_error = true;
                        if let Err(err) = self.metadata.save_field(&errored).await {
                            tracing::warn!(%field_id, error = %err, "failed to record field evaluation error");
                        }
                    }
                }
            }
        }

        if computed.is_empty() {
            return Ok((computed, record.version));
        }

        let persisted = self
            .records
            .update_record(tx, table_id, record.id, &computed, record.version)
            .await?;
        Ok((computed, persisted.version))
    }

    pub async fn create_record(
        &self,
        table_id: TableId,
        values: BTreeMap<FieldId, CellValue>,
        user_id: String,
    ) -> Result<Record> {
        let fields = self.metadata.find_fields_by_table(table_id).await?;
        let normalized = self.normalize(&fields, values).await?;

        let draft = Record {
            id: RecordId::new(),
            table_id,
            auto_number: 0,
            created_time: chrono::Utc::now(),
            last_modified_time: None,
            created_by: user_id.clone(),
            last_modified_by: None,
            version: 1,
            data: normalized.clone(),
        };

        let tx = self.transactions.begin().await?;

        let created = match self.records.create_record(tx.as_ref(), table_id, &draft).await {
            Ok(record) => record,
            Err(err) => {
                self.transactions.rollback(tx).await?;
                return Err(err);
            }
        };

        let changed: Vec<FieldId> = normalized.keys().copied().collect();
        let (computed, final_version) =
            match self.recompute_virtual_fields(tx.as_ref(), table_id, &created, &changed).await {
                Ok(result) => result,
                Err(err) => {
                    self.transactions.rollback(tx).await?;
                    return Err(err);
                }
            };

        self.transactions.commit(tx).await?;

        let mut event_fields = normalized;
        event_fields.extend(computed.clone());
        self.event_bus.stage(RecordEvent::Create {
            table_id,
            record_id: created.id,
            fields: event_fields,
            user_id,
            new_version: final_version,
        });
        self.event_bus.commit().await?;

        let mut result = created;
        result.version = final_version;
        result.data.extend(computed);
        Ok(result)
    }

    pub async fn update_record(
        &self,
        table_id: TableId,
        record_id: RecordId,
        values: BTreeMap<FieldId, CellValue>,
        expected_version: i64,
        user_id: String,
    ) -> Result<Record> {
        let fields = self.metadata.find_fields_by_table(table_id).await?;
        let by_id: BTreeMap<_, _> = fields.iter().map(|f| (f.id, f)).collect();
        let normalized = self.normalize(&fields, values).await?;

        let current = self
            .records
            .find_record(table_id, record_id)
            .await?
            .ok_or_else(|| Error::not_found("record", record_id.to_string()))?;

        let mut link_changes = BTreeMap::new();
        let mut plain_changes = BTreeMap::new();
        for (field_id, cell) in normalized {
            match by_id.get(&field_id).map(|f| f.field_type) {
                Some(FieldType::Link) => {
                    link_changes.insert(field_id, cell);
                }
                _ => {
                    plain_changes.insert(field_id, cell);
                }
            }
        }

        let tx = self.transactions.begin().await?;

        // Link fields go through the Link Engine first so the peer
        // table's denormalized payload stays in sync (spec §4.5); each
        // call bumps this record's own version once, so track that to
        // keep the subsequent plain-field update's optimistic check
        // accurate without re-reading the row mid-transaction.
        let mut version = expected_version;
        for (field_id, cell) in &link_changes {
            let current_ids: BTreeSet<String> = current.get(field_id).link_ids().into_iter().collect();
            let desired_ids: BTreeSet<String> = cell.link_ids().into_iter().collect();

            let to_unlink: Vec<RecordId> =
                current_ids.difference(&desired_ids).filter_map(|id| id.parse().ok()).collect();
            let to_link: Vec<RecordId> =
                desired_ids.difference(&current_ids).filter_map(|id| id.parse().ok()).collect();

            if !to_unlink.is_empty() {
                if let Err(err) =
                    self.link_engine.unlink_records(tx.as_ref(), *field_id, record_id, &to_unlink).await
                {
                    self.transactions.rollback(tx).await?;
                    return Err(err);
                }
                version += 1;
            }
            if !to_link.is_empty() {
                if let Err(err) = self.link_engine.link_records(tx.as_ref(), *field_id, record_id, &to_link).await {
                    self.transactions.rollback(tx).await?;
                    return Err(err);
                }
                version += 1;
            }
        }

        let updated = match self.records.update_record(tx.as_ref(), table_id, record_id, &plain_changes, version).await
        {
            Ok(record) => record,
            Err(err) => {
                self.transactions.rollback(tx).await?;
                return Err(err);
            }
        };

        let mut working = updated.clone();
        for (field_id, cell) in &link_changes {
            working.data.insert(*field_id, cell.clone());
        }

        let mut changed: Vec<FieldId> = plain_changes.keys().copied().collect();
        changed.extend(link_changes.keys().copied());

        let (computed, final_version) =
            match self.recompute_virtual_fields(tx.as_ref(), table_id, &working, &changed).await {
                Ok(result) => result,
                Err(err) => {
                    self.transactions.rollback(tx).await?;
                    return Err(err);
                }
            };

        self.transactions.commit(tx).await?;

        let mut event_fields = plain_changes;
        event_fields.extend(link_changes);
        event_fields.extend(computed.clone());
        self.event_bus.stage(RecordEvent::Update {
            table_id,
            record_id,
            fields: event_fields,
            user_id,
            old_version: expected_version,
            new_version: final_version,
        });
        self.event_bus.commit().await?;

        let mut result = working;
        result.version = final_version;
        result.data.extend(computed);
        Ok(result)
    }

    pub async fn delete_record(
        &self,
        table_id: TableId,
        record_id: RecordId,
        expected_version: i64,
        user_id: String,
    ) -> Result<()> {
        let tx = self.transactions.begin().await?;

        let link_fields = match self.metadata.find_link_fields_to_table(table_id).await {
            Ok(fields) => fields,
            Err(err) => {
                self.transactions.rollback(tx).await?;
                return Err(err);
            }
        };

        for field in link_fields {
            let referencing =
                match self.records.find_records_by_link_value(field.table_id, field.id, &[record_id]).await {
                    Ok(records) => records,
                    Err(err) => {
                        self.transactions.rollback(tx).await?;
                        return Err(err);
                    }
                };
            for referencing_record in referencing {
                if let Err(err) = self
                    .link_engine
                    .unlink_records(tx.as_ref(), field.id, referencing_record.id, &[record_id])
                    .await
                {
                    self.transactions.rollback(tx).await?;
                    return Err(err);
                }
            }
        }

        if let Err(err) = self.records.delete_record(tx.as_ref(), table_id, record_id).await {
            self.transactions.rollback(tx).await?;
            return Err(err);
        }
        self.transactions.commit(tx).await?;

        self.event_bus.stage(RecordEvent::Delete {
            table_id,
            record_id,
            user_id,
            old_version: expected_version,
        });
        self.event_bus.commit().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gridbase_domain::entities::{DependencyType, FieldOptions};
    use gridbase_domain::ports::dependency_graph::DependencyEdge;
    use gridbase_domain::value_objects::LinkRef;

    use crate::services::{CalculationEngineImpl, FieldKernelRegistryImpl, PetgraphDependencyGraph};
    use crate::use_cases::test_support::{
        test_field, test_record, FakeEventBus, FakeLinkEngine, FakeMetadataStore, FakeRecordStore,
        FakeTransactionManager,
    };

    use super::*;

    fn service(
        records: Arc<FakeRecordStore>,
        metadata: Arc<FakeMetadataStore>,
        link_engine: Arc<FakeLinkEngine>,
        event_bus: Arc<FakeEventBus>,
    ) -> RecordService {
        let dependency_graph = Arc::new(PetgraphDependencyGraph::new());
        let calculation_engine = Arc::new(CalculationEngineImpl::new(records.clone(), metadata.clone()));
        RecordService::new(
            records,
            metadata,
            Arc::new(FieldKernelRegistryImpl::new()),
            dependency_graph,
            calculation_engine,
            link_engine,
            event_bus,
            Arc::new(FakeTransactionManager::new()),
        )
    }

    #[tokio::test]
    async fn create_record_stages_event_with_written_fields() {
        let table_id = TableId::new();
        let records = Arc::new(FakeRecordStore::new());
        let metadata = Arc::new(FakeMetadataStore::new());
        let event_bus = Arc::new(FakeEventBus::new());

        let name_field = test_field(
            table_id,
            FieldType::SingleLineText,
            FieldOptions::SingleLineText { max_length: None, default: None },
            "name",
        );
        metadata.seed_field(name_field.clone());

        let svc = service(records.clone(), metadata, Arc::new(FakeLinkEngine::new()), event_bus.clone());

        let mut values = BTreeMap::new();
        values.insert(name_field.id, CellValue::Text("Ada".into()));

        let created = svc.create_record(table_id, values, "alice".into()).await.unwrap();
        assert_eq!(created.version, 1);

        let stored = records.get(table_id, created.id).expect("record persisted");
        assert_eq!(stored.get(&name_field.id), CellValue::Text("Ada".into()));

        let events = event_bus.committed_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordEvent::Create { fields, new_version, user_id, .. } => {
                assert_eq!(*new_version, 1);
                assert_eq!(user_id, "alice");
                assert_eq!(fields.get(&name_field.id), Some(&CellValue::Text("Ada".into())));
            }
            other => panic!("expected a Create event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_record_rejects_stale_version_without_publishing() {
        let table_id = TableId::new();
        let records = Arc::new(FakeRecordStore::new());
        let metadata = Arc::new(FakeMetadataStore::new());
        let event_bus = Arc::new(FakeEventBus::new());

        let name_field = test_field(
            table_id,
            FieldType::SingleLineText,
            FieldOptions::SingleLineText { max_length: None, default: None },
            "name",
        );
        metadata.seed_field(name_field.clone());

        let mut data = BTreeMap::new();
        data.insert(name_field.id, CellValue::Text("Ada".into()));
        let record = test_record(table_id, 3, data);
        let record_id = record.id;
        records.seed(record);

        let svc = service(records.clone(), metadata, Arc::new(FakeLinkEngine::new()), event_bus.clone());

        let mut changes = BTreeMap::new();
        changes.insert(name_field.id, CellValue::Text("Lovelace".into()));

        let err = svc
            .update_record(table_id, record_id, changes, 1, "alice".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        assert!(event_bus.committed_events().is_empty());
        let stored = records.get(table_id, record_id).unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.get(&name_field.id), CellValue::Text("Ada".into()));
    }

    #[tokio::test]
    async fn virtual_field_value_is_folded_into_the_staged_event() {
        let table_id = TableId::new();
        let records = Arc::new(FakeRecordStore::new());
        let metadata = Arc::new(FakeMetadataStore::new());
        let event_bus = Arc::new(FakeEventBus::new());

        let amount_field = test_field(
            table_id,
            FieldType::Number,
            FieldOptions::Number { precision: 2, format: None, min: None, max: None },
            "amount",
        );
        metadata.seed_field(amount_field.clone());

        let doubled_field = test_field(
            table_id,
            FieldType::Formula,
            FieldOptions::Formula { expression: format!("{{{}}} * 2", amount_field.id) },
            "doubled",
        );
        metadata.seed_field(doubled_field.clone());

        let dependency_graph = Arc::new(PetgraphDependencyGraph::new());
        dependency_graph
            .set_dependencies(
                doubled_field.id,
                vec![DependencyEdge {
                    source_field_id: amount_field.id,
                    dependent_field_id: doubled_field.id,
                    dependency_type: DependencyType::Formula,
                }],
            )
            .await
            .unwrap();

        let calculation_engine = Arc::new(CalculationEngineImpl::new(records.clone(), metadata.clone()));
        let svc = RecordService::new(
            records.clone(),
            metadata,
            Arc::new(FieldKernelRegistryImpl::new()),
            dependency_graph,
            calculation_engine,
            Arc::new(FakeLinkEngine::new()),
            event_bus.clone(),
            Arc::new(FakeTransactionManager::new()),
        );

        let mut values = BTreeMap::new();
        values.insert(amount_field.id, CellValue::Number(5.0));

        let created = svc.create_record(table_id, values, "alice".into()).await.unwrap();
        assert_eq!(created.get(&doubled_field.id), CellValue::Number(10.0));
        // recompute_virtual_fields persists its own update, bumping the
        // version a second time past the initial insert.
        assert_eq!(created.version, 2);

        let events = event_bus.committed_events();
        match &events[0] {
            RecordEvent::Create { fields, new_version, .. } => {
                assert_eq!(*new_version, 2);
                assert_eq!(fields.get(&doubled_field.id), Some(&CellValue::Number(10.0)));
            }
            other => panic!("expected a Create event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_record_unlinks_inbound_references_before_removing_the_row() {
        let table_a = TableId::new();
        let table_b = TableId::new();
        let records = Arc::new(FakeRecordStore::new());
        let metadata = Arc::new(FakeMetadataStore::new());
        let event_bus = Arc::new(FakeEventBus::new());
        let link_engine = Arc::new(FakeLinkEngine::new());

        let target = test_record(table_a, 1, BTreeMap::new());
        let target_id = target.id;
        records.seed(target);

        let link_field = test_field(
            table_b,
            FieldType::Link,
            FieldOptions::Link {
                linked_table_id: table_a,
                relationship: gridbase_domain::entities::Relationship::ManyOne,
                symmetric_field_id: None,
                lookup_field_id: None,
                fk_host_column: None,
                is_one_way: false,
                filter_by_view_id: None,
                visible_field_ids: Vec::new(),
            },
            "linked_a",
        );
        metadata.seed_field(link_field.clone());

        let mut referencing_data = BTreeMap::new();
        referencing_data.insert(
            link_field.id,
            CellValue::Ref(LinkRef { id: target_id.to_string(), title: None, extra: Default::default() }),
        );
        let referencing = test_record(table_b, 1, referencing_data);
        let referencing_id = referencing.id;
        records.seed(referencing);

        let svc = service(records.clone(), metadata, link_engine.clone(), event_bus.clone());

        svc.delete_record(table_a, target_id, 1, "alice".into()).await.unwrap();

        assert!(records.get(table_a, target_id).is_none());

        let unlink_calls = link_engine.unlink_calls.lock().unwrap();
        assert_eq!(unlink_calls.len(), 1);
        assert_eq!(unlink_calls[0], (link_field.id, referencing_id, vec![target_id]));
        drop(unlink_calls);

        let events = event_bus.committed_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RecordEvent::Delete { record_id, .. } if *record_id == target_id));
    }
}
