//! # Domain Layer
//!
//! Pure business types for the multi-dimensional spreadsheet engine: the
//! Base/Table/Field/Record entities, the cell-value model, the field
//! dependency graph, and the ports (traits) every other crate implements or
//! consumes. Nothing in this crate talks to a database, a socket, or the
//! filesystem.
#![allow(missing_docs)]

pub mod constants;
pub mod entities;
pub mod error;
pub mod events;
pub mod ports;
pub mod schema;
pub mod value_objects;

pub use error::{Error, Result};
