//! The cell-value model.
//!
//! A cell is dynamically typed at the domain layer: its shape depends on
//! the owning [`crate::entities::FieldType`]. [`CellValue`] is the tagged
//! variant every [`crate::ports::field_kernel::FieldTypeHandler`]
//! converts to and from a DB value, per spec §9's re-architecture note
//! ("represent a record row as `{system_fields, map<field_id, cell_value>}`").

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A linked-record or user reference payload: `{id, title}` plus optional
/// extra display fields (e.g. avatar for `user` fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    /// Id of the referenced record or user.
    pub id: String,
    /// Denormalized display title, kept in sync by
    /// `BatchUpdateLinkFieldTitle` (record_store) / title-update callbacks.
    pub title: Option<String>,
    /// Any additional fields the caller wants to carry (avatar, email, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A single cell's value, independent of its physical column type.
///
/// `Null` is distinct from "field absent": a record's data map only ever
/// contains keys for fields the user has touched; reading a missing key
/// is the caller's job (usually defaulting to `Null`), never this type's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Explicit null / empty cell.
    Null,
    /// `singleLineText`, `longText`, `singleSelect`.
    Text(String),
    /// `number`, `rating`, numeric `rollup`, `count`, numeric `formula`.
    Number(f64),
    /// `checkbox`.
    Bool(bool),
    /// `date`, `dateTime`, `createdTime`, `lastModifiedTime`.
    DateTime(DateTime<Utc>),
    /// `multipleSelect` (array of choice names) or any list-shaped value.
    Array(Vec<CellValue>),
    /// `link` (single-valued shapes), `user` (single), denormalized refs.
    Ref(LinkRef),
    /// `link` (multi-valued shapes), `user` (multiple), `attachment`.
    RefList(Vec<LinkRef>),
}

impl CellValue {
    /// `true` for [`CellValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Best-effort coercion to `f64`, used by numeric rollups and the
    /// `count` field type. Returns `None` for non-numeric shapes rather
    /// than failing the whole record write — the caller sets
    /// `Field.has_error` on `None` per spec §4.7.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Length used by the `count` field type and list-shaped rollups.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Array(items) => items.len(),
            Self::RefList(items) => items.len(),
            Self::Ref(_) => 1,
            _ => 1,
        }
    }

    /// `true` if [`CellValue::len`] would return zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids carried by a link-shaped cell, in either the single-object or
    /// array storage shape (spec §4.3's "two storage shapes of a Link
    /// cell").
    #[must_use]
    pub fn link_ids(&self) -> Vec<String> {
        match self {
            Self::Ref(r) => vec![r.id.clone()],
            Self::RefList(list) => list.iter().map(|r| r.id.clone()).collect(),
            _ => Vec::new(),
        }
    }
}
