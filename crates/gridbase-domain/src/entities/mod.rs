//! Core entities: Base, Table, Field, Record, View, and the dependency edge
//! that links Fields together into a DAG.

mod base;
mod field;
mod field_dependency;
mod record;
mod table;
mod view;

pub use base::Base;
pub use field::{AggregationFunc, Field, FieldOptions, FieldType, Relationship, SelectChoice};
pub use field_dependency::{DependencyType, FieldDependencyEdge};
pub use record::Record;
pub use table::Table;
pub use view::View;
