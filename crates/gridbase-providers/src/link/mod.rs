//! C5 — PostgreSQL [`LinkEngine`] implementation: creates symmetric Link
//! field pairs, keeps their denormalized `{id, title}` payloads in sync,
//! and migrates cardinality (spec §4.5).
//!
//! Every cardinality is physically realized through each side's
//! denormalized JSONB column — a single-valued [`CellValue::Ref`] for
//! the `*One` end, a [`CellValue::RefList`] for the `many` end. A
//! junction table is additionally provisioned for `manyMany` links so
//! the catalog keeps a queryable edge list, but record reads/writes
//! never need it: they go through the JSONB column on both sides.

use std::sync::Arc;

use async_trait::async_trait;

use gridbase_domain::entities::{Field, FieldOptions, Relationship};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::transaction::Transaction;
use gridbase_domain::ports::{LinkEngine, MetadataStore, RecordStore, SchemaProvider};
use gridbase_domain::schema::ColumnType;
use gridbase_domain::value_objects::{CellValue, FieldId, LinkRef, RecordId, TableId};

pub struct PostgresLinkEngine {
    metadata: Arc<dyn MetadataStore>,
    schema: Arc<dyn SchemaProvider>,
    records: Arc<dyn RecordStore>,
}

impl PostgresLinkEngine {
    #[must_use]
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        schema: Arc<dyn SchemaProvider>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self { metadata, schema, records }
    }

    async fn base_id_of(&self, table_id: TableId) -> Result<gridbase_domain::value_objects::BaseId> {
        self.metadata
            .find_table(table_id)
            .await?
            .map(|t| t.base_id)
            .ok_or_else(|| Error::not_found("table", table_id.to_string()))
    }

    async fn link_field(&self, field_id: FieldId) -> Result<Field> {
        self.metadata.find_field(field_id).await?.ok_or_else(|| Error::not_found("field", field_id.to_string()))
    }

    /// Best-effort display title for a linked record: its first
    /// non-virtual text-shaped field value, falling back to the record
    /// id.
    async fn title_for(&self, table_id: TableId, record_id: RecordId) -> Result<Option<String>> {
        let Some(record) = self.records.find_record(table_id, record_id).await? else {
            return Ok(None);
        };
        let fields = self.metadata.find_fields_by_table(table_id).await?;
        let title = fields
            .iter()
            .filter(|f| !f.field_type.is_virtual())
            .find_map(|f| match record.get(&f.id) {
                CellValue::Text(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .unwrap_or_else(|| record_id.to_string());
        Ok(Some(title))
    }
}

fn is_single_valued(relationship: Relationship) -> bool {
    matches!(relationship, Relationship::ManyOne | Relationship::OneOne)
}

fn to_ref_list(cell: &CellValue) -> Vec<LinkRef> {
    match cell {
        CellValue::Ref(r) => vec![r.clone()],
        CellValue::RefList(list) => list.clone(),
        _ => Vec::new(),
    }
}

fn from_ref_list(mut refs: Vec<LinkRef>, single_valued: bool) -> CellValue {
    if single_valued {
        refs.pop().map_or(CellValue::Null, CellValue::Ref)
    } else {
        CellValue::RefList(refs)
    }
}

#[async_trait]
impl LinkEngine for PostgresLinkEngine {
    async fn create_link_field(
        &self,
        _tx: &dyn Transaction,
        table_id: TableId,
        linked_table_id: TableId,
        relationship: Relationship,
        field_name: &str,
    ) -> Result<(Field, Field)> {
        let base_id = self.base_id_of(table_id).await?;
        let linked_base_id = self.base_id_of(linked_table_id).await?;

        let field_a_id = FieldId::new();
        let field_b_id = FieldId::new();
        let now = chrono::Utc::now();

        let db_field_name_a = format!("f_{}", field_a_id.as_uuid().simple());
        let db_field_name_b = format!("f_{}", field_b_id.as_uuid().simple());

        let symmetric = relationship.symmetric();
        let junction_name = if matches!(relationship, Relationship::ManyMany) {
            Some(format!("lnk_{}", field_a_id.as_uuid().simple()))
        } else {
            None
        };

        let field_a = Field {
            id: field_a_id,
            table_id,
            name: field_name.to_owned(),
            field_type: gridbase_domain::entities::FieldType::Link,
            db_field_name: db_field_name_a.clone(),
            db_field_type: ColumnType::Jsonb,
            options: FieldOptions::Link {
                linked_table_id,
                relationship,
                symmetric_field_id: Some(field_b_id),
                lookup_field_id: None,
                fk_host_column: junction_name.clone(),
                is_one_way: false,
                filter_by_view_id: None,
                visible_field_ids: Vec::new(),
            },
            is_computed: false,
            is_lookup: false,
            field_order: 0.0,
            is_pending: false,
            has_error: false,
            lookup_options_snapshot: None,
            created_by: "system".to_owned(),
            created_time: now,
            deleted_time: None,
        };

        let field_b = Field {
            id: field_b_id,
            table_id: linked_table_id,
            name: format!("{field_name} (linked)"),
            field_type: gridbase_domain::entities::FieldType::Link,
            db_field_name: db_field_name_b.clone(),
            db_field_type: ColumnType::Jsonb,
            options: FieldOptions::Link {
                linked_table_id: table_id,
                relationship: symmetric,
                symmetric_field_id: Some(field_a_id),
                lookup_field_id: None,
                fk_host_column: junction_name.clone(),
                is_one_way: false,
                filter_by_view_id: None,
                visible_field_ids: Vec::new(),
            },
            is_computed: false,
            is_lookup: false,
            field_order: 0.0,
            is_pending: false,
            has_error: false,
            lookup_options_snapshot: None,
            created_by: "system".to_owned(),
            created_time: now,
            deleted_time: None,
        };

        self.schema
            .add_column(
                base_id,
                table_id,
                gridbase_domain::schema::ColumnDef {
                    name: db_field_name_a,
                    type_: ColumnType::Jsonb,
                    primary_key: false,
                    unique: false,
                    not_null: false,
                    default: None,
                },
            )
            .await?;
        self.schema
            .add_column(
                linked_base_id,
                linked_table_id,
                gridbase_domain::schema::ColumnDef {
                    name: db_field_name_b,
                    type_: ColumnType::Jsonb,
                    primary_key: false,
                    unique: false,
                    not_null: false,
                    default: None,
                },
            )
            .await?;

        if let Some(junction_name) = &junction_name {
            self.schema.create_junction_table(base_id, junction_name, "self_id", "foreign_id").await?;
        }

        self.metadata.save_field(&field_a).await?;
        self.metadata.save_field(&field_b).await?;

        Ok((field_a, field_b))
    }

    async fn migrate_cardinality(
        &self,
        tx: &dyn Transaction,
        field_id: FieldId,
        new_relationship: Relationship,
    ) -> Result<()> {
        let mut field = self.link_field(field_id).await?;
        let FieldOptions::Link {
            linked_table_id,
            relationship: old_relationship,
            symmetric_field_id,
            fk_host_column,
            ..
        } = field.options.clone()
        else {
            return Err(Error::validation("migrate_cardinality called on a non-link field"));
        };

        let base_id = self.base_id_of(field.table_id).await?;
        let was_many_many = matches!(old_relationship, Relationship::ManyMany);
        let becomes_many_many = matches!(new_relationship, Relationship::ManyMany);

        let new_junction = if becomes_many_many && !was_many_many {
            let name = format!("lnk_{}", field_id.as_uuid().simple());
            self.schema.create_junction_table(base_id, &name, "self_id", "foreign_id").await?;
            Some(name)
        } else if was_many_many && !becomes_many_many {
            if let Some(name) = &fk_host_column {
                self.schema.drop_junction_table(base_id, name).await?;
            }
            None
        } else {
            fk_host_column.clone()
        };

        let was_single = is_single_valued(old_relationship);
        let becomes_single = is_single_valued(new_relationship);
        if was_single != becomes_single {
            let mut offset = 0;
            loop {
                let page = self.records.list_records(field.table_id, offset, 200).await?;
                if page.records.is_empty() {
                    break;
                }
                for record in &page.records {
                    let refs = to_ref_list(&record.get(&field_id));
                    let converted = from_ref_list(refs, becomes_single);
                    let mut changes = std::collections::BTreeMap::new();
                    changes.insert(field_id, converted);
                    self.records.update_record(tx, field.table_id, record.id, &changes, record.version).await?;
                }
                offset += 200;
            }
        }

        field.options = FieldOptions::Link {
            linked_table_id,
            relationship: new_relationship,
            symmetric_field_id,
            lookup_field_id: None,
            fk_host_column: new_junction,
            is_one_way: false,
            filter_by_view_id: None,
            visible_field_ids: Vec::new(),
        };
        self.metadata.save_field(&field).await?;

        if let Some(peer_id) = symmetric_field_id {
            let mut peer = self.link_field(peer_id).await?;
            if let FieldOptions::Link { linked_table_id, symmetric_field_id, fk_host_column, .. } =
                peer.options.clone()
            {
                peer.options = FieldOptions::Link {
                    linked_table_id,
                    relationship: new_relationship.symmetric(),
                    symmetric_field_id,
                    lookup_field_id: None,
                    fk_host_column,
                    is_one_way: false,
                    filter_by_view_id: None,
                    visible_field_ids: Vec::new(),
                };
                self.metadata.save_field(&peer).await?;
            }
        }

        Ok(())
    }

    async fn link_records(
        &self,
        tx: &dyn Transaction,
        field_id: FieldId,
        record_id: RecordId,
        target_ids: &[RecordId],
    ) -> Result<()> {
        let field = self.link_field(field_id).await?;
        let FieldOptions::Link { linked_table_id, relationship, symmetric_field_id, .. } = field.options.clone()
        else {
            return Err(Error::validation("link_records called on a non-link field"));
        };
        let Some(peer_id) = symmetric_field_id else {
            return Err(Error::Referential { message: "link field has no symmetric peer".to_owned() });
        };

        let Some(record) = self.records.find_record(field.table_id, record_id).await? else {
            return Err(Error::not_found("record", record_id.to_string()));
        };
        let this_title = self.title_for(field.table_id, record_id).await?;

        let mut owner_refs = to_ref_list(&record.get(&field_id));
        for &target_id in target_ids {
            let title = self.title_for(linked_table_id, target_id).await?;
            owner_refs.retain(|r| r.id != target_id.to_string());
            owner_refs.push(LinkRef { id: target_id.to_string(), title, extra: Default::default() });
        }
        let mut owner_changes = std::collections::BTreeMap::new();
        owner_changes.insert(field_id, from_ref_list(owner_refs, is_single_valued(relationship)));
        self.records.update_record(tx, field.table_id, record_id, &owner_changes, record.version).await?;

        let peer_relationship = relationship.symmetric();
        for &target_id in target_ids {
            let Some(target_record) = self.records.find_record(linked_table_id, target_id).await? else {
                continue;
            };
            let mut peer_refs = to_ref_list(&target_record.get(&peer_id));
            peer_refs.retain(|r| r.id != record_id.to_string());
            peer_refs.push(LinkRef { id: record_id.to_string(), title: this_title.clone(), extra: Default::default() });
            let mut peer_changes = std::collections::BTreeMap::new();
            peer_changes.insert(peer_id, from_ref_list(peer_refs, is_single_valued(peer_relationship)));
            self.records.update_record(tx, linked_table_id, target_id, &peer_changes, target_record.version).await?;
        }
        Ok(())
    }

    async fn unlink_records(
        &self,
        tx: &dyn Transaction,
        field_id: FieldId,
        record_id: RecordId,
        target_ids: &[RecordId],
    ) -> Result<()> {
        let field = self.link_field(field_id).await?;
        let FieldOptions::Link { linked_table_id, relationship, symmetric_field_id, .. } = field.options.clone()
        else {
            return Err(Error::validation("unlink_records called on a non-link field"));
        };
        let Some(peer_id) = symmetric_field_id else {
            return Err(Error::Referential { message: "link field has no symmetric peer".to_owned() });
        };

        let Some(record) = self.records.find_record(field.table_id, record_id).await? else {
            return Err(Error::not_found("record", record_id.to_string()));
        };
        let removed_ids: Vec<String> = target_ids.iter().map(ToString::to_string).collect();

        let mut owner_refs = to_ref_list(&record.get(&field_id));
        owner_refs.retain(|r| !removed_ids.contains(&r.id));
        let mut owner_changes = std::collections::BTreeMap::new();
        owner_changes.insert(field_id, from_ref_list(owner_refs, is_single_valued(relationship)));
        self.records.update_record(tx, field.table_id, record_id, &owner_changes, record.version).await?;

        let peer_relationship = relationship.symmetric();
        for &target_id in target_ids {
            let Some(target_record) = self.records.find_record(linked_table_id, target_id).await? else {
                continue;
            };
            let mut peer_refs = to_ref_list(&target_record.get(&peer_id));
            peer_refs.retain(|r| r.id != record_id.to_string());
            let mut peer_changes = std::collections::BTreeMap::new();
            peer_changes.insert(peer_id, from_ref_list(peer_refs, is_single_valued(peer_relationship)));
            self.records.update_record(tx, linked_table_id, target_id, &peer_changes, target_record.version).await?;
        }
        Ok(())
    }

    async fn delete_link_field(&self, _tx: &dyn Transaction, field_id: FieldId) -> Result<()> {
        let field = self.link_field(field_id).await?;
        let FieldOptions::Link { symmetric_field_id, fk_host_column, .. } = field.options.clone() else {
            return Err(Error::validation("delete_link_field called on a non-link field"));
        };
        let base_id = self.base_id_of(field.table_id).await?;

        if let Some(junction) = &fk_host_column {
            self.schema.drop_junction_table(base_id, junction).await?;
        }
        self.schema.drop_column(base_id, field.table_id, &field.db_field_name).await?;
        self.metadata.soft_delete_field(field_id).await?;

        if let Some(peer_id) = symmetric_field_id {
            let peer = self.link_field(peer_id).await?;
            let peer_base_id = self.base_id_of(peer.table_id).await?;
            self.schema.drop_column(peer_base_id, peer.table_id, &peer.db_field_name).await?;
            self.metadata.soft_delete_field(peer_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_ref(id: &str) -> LinkRef {
        LinkRef { id: id.to_owned(), title: Some(id.to_owned()), extra: Default::default() }
    }

    #[test]
    fn single_valued_relationships() {
        assert!(is_single_valued(Relationship::ManyOne));
        assert!(is_single_valued(Relationship::OneOne));
        assert!(!is_single_valued(Relationship::OneMany));
        assert!(!is_single_valued(Relationship::ManyMany));
    }

    #[test]
    fn to_ref_list_unwraps_single_ref() {
        let cell = CellValue::Ref(link_ref("r1"));
        assert_eq!(to_ref_list(&cell), vec![link_ref("r1")]);
    }

    #[test]
    fn to_ref_list_non_link_cell_is_empty() {
        assert!(to_ref_list(&CellValue::Null).is_empty());
        assert!(to_ref_list(&CellValue::Text("x".into())).is_empty());
    }

    #[test]
    fn from_ref_list_single_valued_keeps_last() {
        let refs = vec![link_ref("a"), link_ref("b")];
        let cell = from_ref_list(refs, true);
        assert_eq!(cell, CellValue::Ref(link_ref("b")));
    }

    #[test]
    fn from_ref_list_single_valued_empty_is_null() {
        assert_eq!(from_ref_list(Vec::new(), true), CellValue::Null);
    }

    #[test]
    fn from_ref_list_many_valued_keeps_all() {
        let refs = vec![link_ref("a"), link_ref("b")];
        let cell = from_ref_list(refs.clone(), false);
        assert_eq!(cell, CellValue::RefList(refs));
    }
}
