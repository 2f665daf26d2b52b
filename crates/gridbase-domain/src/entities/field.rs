//! A Field: a column definition, possibly computed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::schema::ColumnType;
use crate::value_objects::{FieldId, TableId, ViewId};

/// The field type tag. Drives DB column typing ([`ColumnType`] mapping,
/// spec §4.1), cell conversion ([`crate::ports::field_kernel`]), and
/// dependency-edge construction ([`crate::ports::dependency_graph`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    SingleLineText,
    LongText,
    Number,
    Rating,
    Date,
    DateTime,
    Checkbox,
    SingleSelect,
    MultipleSelect,
    User,
    Attachment,
    Link,
    Formula,
    Lookup,
    Rollup,
    Count,
}

impl FieldType {
    /// `true` for Formula/Lookup/Rollup/Count — fields whose value is
    /// derived rather than written directly by a client.
    #[must_use]
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            Self::Formula | Self::Lookup | Self::Rollup | Self::Count
        )
    }

    /// The physical [`ColumnType`] this field type maps to, per spec
    /// §4.1. `Formula` has no fixed mapping here: its column type is the
    /// result type of the evaluated expression, resolved by the
    /// Calculation Engine at field-creation time and stored back onto
    /// the `Field` row, not derivable from the type tag alone.
    #[must_use]
    pub fn default_column_type(self) -> Option<ColumnType> {
        match self {
            Self::SingleLineText | Self::LongText | Self::SingleSelect => {
                Some(ColumnType::Text)
            }
            Self::Number | Self::Rating | Self::Rollup | Self::Count => {
                Some(ColumnType::DoublePrecision)
            }
            Self::Checkbox => Some(ColumnType::Boolean),
            Self::Date | Self::DateTime => Some(ColumnType::Timestamp),
            Self::MultipleSelect | Self::User | Self::Attachment | Self::Link | Self::Lookup => {
                Some(ColumnType::Jsonb)
            }
            Self::Formula => None,
        }
    }
}

/// Cardinality of a Link relationship, spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    ManyMany,
    ManyOne,
    OneMany,
    OneOne,
}

impl Relationship {
    /// The cardinality the symmetric peer field must carry, per spec
    /// §4.5 ("manyOne ↔ oneMany, manyMany ↔ manyMany, oneOne ↔ oneOne").
    #[must_use]
    pub fn symmetric(self) -> Self {
        match self {
            Self::ManyOne => Self::OneMany,
            Self::OneMany => Self::ManyOne,
            Self::ManyMany => Self::ManyMany,
            Self::OneOne => Self::OneOne,
        }
    }
}

/// Aggregation function for a `rollup` field, spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

/// A single choice in a `singleSelect`/`multipleSelect` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectChoice {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

/// Type-specific options, spec §4.4's options column. One variant per
/// [`FieldType`]; `validate_options` in
/// [`crate::ports::field_kernel::FieldTypeHandler`] checks a variant's
/// contents against the matching [`FieldType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldOptions {
    SingleLineText {
        max_length: Option<u32>,
        default: Option<String>,
    },
    LongText {
        default: Option<String>,
    },
    Number {
        precision: u8,
        format: Option<String>,
        min: Option<f64>,
        max: Option<f64>,
    },
    Rating {
        max: u8,
        icon: Option<String>,
    },
    Date {
        format: Option<String>,
        timezone: Option<String>,
    },
    Checkbox {
        default: bool,
    },
    SingleSelect {
        choices: Vec<SelectChoice>,
    },
    MultipleSelect {
        choices: Vec<SelectChoice>,
    },
    User {
        allow_multiple: bool,
    },
    Attachment {
        max_file_size: Option<u64>,
        allowed_types: Vec<String>,
    },
    Link {
        linked_table_id: TableId,
        relationship: Relationship,
        symmetric_field_id: Option<FieldId>,
        lookup_field_id: Option<FieldId>,
        /// Name of the owning-side foreign-key / junction column(s);
        /// populated by the Link Engine once the physical realization
        /// exists (spec §4.5).
        fk_host_column: Option<String>,
        /// `true` if editing this field does not keep a user-visible
        /// peer Field in sync — see SPEC_FULL §4.10's resolved Open
        /// Question. The peer's denormalized JSONB read-side column is
        /// still updated.
        is_one_way: bool,
        filter_by_view_id: Option<ViewId>,
        #[serde(default)]
        visible_field_ids: Vec<FieldId>,
    },
    Formula {
        expression: String,
    },
    Lookup {
        link_field_id: FieldId,
        lookup_field_id: FieldId,
    },
    Rollup {
        link_field_id: FieldId,
        rollup_field_id: FieldId,
        aggregation_func: AggregationFunc,
    },
    Count {
        link_field_id: FieldId,
    },
}

impl FieldOptions {
    /// The [`FieldType`] this options variant corresponds to.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::SingleLineText { .. } => FieldType::SingleLineText,
            Self::LongText { .. } => FieldType::LongText,
            Self::Number { .. } => FieldType::Number,
            Self::Rating { .. } => FieldType::Rating,
            Self::Date { .. } => FieldType::Date,
            Self::Checkbox { .. } => FieldType::Checkbox,
            Self::SingleSelect { .. } => FieldType::SingleSelect,
            Self::MultipleSelect { .. } => FieldType::MultipleSelect,
            Self::User { .. } => FieldType::User,
            Self::Attachment { .. } => FieldType::Attachment,
            Self::Link { .. } => FieldType::Link,
            Self::Formula { .. } => FieldType::Formula,
            Self::Lookup { .. } => FieldType::Lookup,
            Self::Rollup { .. } => FieldType::Rollup,
            Self::Count { .. } => FieldType::Count,
        }
    }
}

/// A column definition, possibly computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub table_id: TableId,
    pub name: String,
    pub field_type: FieldType,
    /// Physical column name. Invariant (spec §3.2): unique within the
    /// table, never renamed once created.
    pub db_field_name: String,
    pub db_field_type: ColumnType,
    pub options: FieldOptions,
    pub is_computed: bool,
    pub is_lookup: bool,
    pub field_order: f64,
    /// Set while an async recompute is outstanding for this field
    /// (spec invariant 6).
    pub is_pending: bool,
    /// Set when the last evaluation attempt failed (spec invariant 6,
    /// §4.7's error handling rule).
    pub has_error: bool,
    /// Snapshot of the source field's type/options at lookup-creation
    /// time (SPEC_FULL §3 supplement from `original_source`), refreshed
    /// when the source field's options change.
    pub lookup_options_snapshot: Option<Box<FieldOptions>>,
    pub created_by: String,
    pub created_time: DateTime<Utc>,
    pub deleted_time: Option<DateTime<Utc>>,
}

impl Field {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_time.is_some()
    }

    /// Extract [`crate::entities::field::FieldOptions::Link`] fields, if
    /// this is a Link field.
    #[must_use]
    pub fn as_link_options(&self) -> Option<(&TableId, Relationship, Option<FieldId>, bool)> {
        match &self.options {
            FieldOptions::Link {
                linked_table_id,
                relationship,
                symmetric_field_id,
                is_one_way,
                ..
            } => Some((linked_table_id, *relationship, *symmetric_field_id, *is_one_way)),
            _ => None,
        }
    }
}
