//! C5 — Link Engine port, spec §4.5.

use async_trait::async_trait;

use crate::entities::{Field, Relationship};
use crate::error::Result;
use crate::ports::transaction::Transaction;
use crate::value_objects::{FieldId, RecordId, TableId};

/// Symmetric link management: every Link field has exactly one peer
/// field (on the same table, for self-links, or the linked table),
/// and the two are kept in lockstep.
#[async_trait]
pub trait LinkEngine: Send + Sync {
    /// Create both sides of a new link relationship: the field the
    /// caller asked for plus its auto-generated symmetric peer on
    /// `linked_table_id`. Provisions a junction table for `ManyMany`,
    /// or a foreign-key column for the `*One` cardinalities (spec
    /// §4.5).
    async fn create_link_field(
        &self,
        tx: &dyn Transaction,
        table_id: TableId,
        linked_table_id: TableId,
        relationship: Relationship,
        field_name: &str,
    ) -> Result<(Field, Field)>;

    /// Re-point the stored references when `relationship` changes
    /// (e.g. `ManyMany` to `ManyOne`), migrating the junction table to
    /// a foreign-key column or vice versa, per spec §4.5.
    async fn migrate_cardinality(
        &self,
        tx: &dyn Transaction,
        field_id: FieldId,
        new_relationship: Relationship,
    ) -> Result<()>;

    /// Link `record_id` on `field_id`'s table to `target_ids` on the
    /// peer table, updating both sides' denormalized `{id, title}`
    /// payloads.
    async fn link_records(
        &self,
        tx: &dyn Transaction,
        field_id: FieldId,
        record_id: RecordId,
        target_ids: &[RecordId],
    ) -> Result<()>;

    /// Remove the link between `record_id` and `target_ids`.
    async fn unlink_records(
        &self,
        tx: &dyn Transaction,
        field_id: FieldId,
        record_id: RecordId,
        target_ids: &[RecordId],
    ) -> Result<()>;

    /// Drop both sides of a link relationship (the field itself and
    /// its peer), tearing down the junction table or FK column.
    async fn delete_link_field(&self, tx: &dyn Transaction, field_id: crate::value_objects::FieldId) -> Result<()>;
}
