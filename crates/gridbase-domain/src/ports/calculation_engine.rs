//! C7 — Calculation Engine port, spec §4.7.

use async_trait::async_trait;

use std::collections::BTreeMap;

use crate::entities::{Field, FieldType};
use crate::error::Result;
use crate::ports::transaction::Transaction;
use crate::value_objects::{CellValue, FieldId, RecordId, TableId};

/// Whether a recompute pass covers every record of a table or only
/// records touched by the triggering write (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Recompute every record; used when a field's definition changes
    /// (formula text, aggregation function, linked field).
    Batch,
    /// Recompute only `record_ids` passed to
    /// [`CalculationEngine::evaluate`]; used on ordinary record writes.
    Incremental,
}

/// Evaluates Formula, Lookup, Rollup, and Count fields in dependency
/// order.
#[async_trait]
pub trait CalculationEngine: Send + Sync {
    /// Compute `field`'s value for `record_ids` (ignored in
    /// [`EvaluationMode::Batch`], which covers the whole table) and
    /// persist the results to each record's cached cell inside `tx`.
    /// Returns the number of records updated.
    async fn evaluate(
        &self,
        tx: &dyn Transaction,
        table_id: TableId,
        field: &Field,
        record_ids: &[RecordId],
        mode: EvaluationMode,
    ) -> Result<u64>;

    /// Compute `field`'s value for a single already-loaded `record`
    /// without persisting it — used by [`crate::ports::RecordStore`]
    /// callers that need the freshly computed value before the
    /// surrounding transaction commits (spec §4.11's in-tx recompute).
    async fn evaluate_for_record(
        &self,
        record: &crate::entities::Record,
        field: &Field,
    ) -> Result<CellValue>;

    /// Parse and type-check a formula expression against the field
    /// types it references, without evaluating it against any
    /// record. Used when a Formula field is created or edited.
    fn validate_formula(&self, expression: &str, field_types: &[(FieldId, FieldType)]) -> Result<()>;

    /// Evaluate a single formula expression against one record's
    /// already-resolved field values (the pure, side-effect-free
    /// core the `Batch`/`Incremental` paths both call into).
    fn evaluate_formula(
        &self,
        expression: &str,
        values: &BTreeMap<FieldId, CellValue>,
    ) -> Result<CellValue>;
}
