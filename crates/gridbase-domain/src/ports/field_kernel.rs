//! C4 — Field Kernel port, spec §4.4.

use crate::entities::{FieldOptions, FieldType};
use crate::error::Result;
use crate::schema::ColumnType;
use crate::value_objects::CellValue;

/// Per-field-type behavior: validates options, maps cell values to and
/// from the physical column, and decides the column type a field of
/// this kind needs (spec §4.4's type-mapping table).
///
/// Non-virtual field types (`SingleLineText`, `Number`, ...) implement
/// this directly; virtual types (`Formula`, `Lookup`, `Rollup`, `Count`)
/// implement it for the *stored cache* representation only — computing
/// the value itself is the [`crate::ports::CalculationEngine`]'s job.
pub trait FieldKernel: Send + Sync {
    /// The [`FieldType`] this kernel handles.
    fn field_type(&self) -> FieldType;

    /// Validate `options` is a well-formed configuration for this
    /// field's type (e.g. a `SingleSelect`'s choices have unique ids).
    fn validate_options(&self, options: &FieldOptions) -> Result<()>;

    /// The canonical physical column type a field of this kind is
    /// stored as.
    fn column_type(&self, options: &FieldOptions) -> ColumnType;

    /// Coerce a user-supplied [`CellValue`] into the normalized form
    /// this field type persists (e.g. trimming text, validating a
    /// `SingleSelect` choice id exists in `options`).
    fn normalize_cell(&self, options: &FieldOptions, value: CellValue) -> Result<CellValue>;
}

/// Looks up the [`FieldKernel`] for a given [`FieldType`]; the registry
/// implementations live in `gridbase-application`.
pub trait FieldKernelRegistry: Send + Sync {
    fn kernel_for(&self, field_type: FieldType) -> Option<&dyn FieldKernel>;
}
