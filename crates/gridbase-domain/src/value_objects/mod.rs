//! Strong-typed identifiers and the cell-value model.

mod cell_value;
mod ids;

pub use cell_value::{CellValue, LinkRef};
pub use ids::{BaseId, FieldId, RecordId, TableId, ViewId};
