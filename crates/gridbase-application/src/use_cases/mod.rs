//! Use cases: the orchestrators that stitch domain ports together into
//! the operations a Base/Table/Field/Record backend exposes externally.

mod base_service;
mod field_service;
mod link_field_service;
mod record_service;
mod table_service;
#[cfg(test)]
mod test_support;

pub use base_service::BaseService;
pub use field_service::FieldService;
pub use link_field_service::LinkFieldService;
pub use record_service::RecordService;
pub use table_service::TableService;
