//! Per-[`FieldType`] validation/normalization kernels and the registry
//! that dispatches to them (spec §4.4).

use std::collections::HashMap;

use gridbase_domain::entities::{FieldOptions, FieldType};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::field_kernel::{FieldKernel, FieldKernelRegistry};
use gridbase_domain::schema::ColumnType;
use gridbase_domain::value_objects::CellValue;

macro_rules! simple_kernel {
    ($name:ident, $field_type:expr, $column_type:expr) => {
        struct $name;

        impl FieldKernel for $name {
            fn field_type(&self) -> FieldType {
                $field_type
            }

            fn validate_options(&self, _options: &FieldOptions) -> Result<()> {
                Ok(())
            }

            fn column_type(&self, _options: &FieldOptions) -> ColumnType {
                $column_type
            }

            fn normalize_cell(&self, _options: &FieldOptions, value: CellValue) -> Result<CellValue> {
                Ok(value)
            }
        }
    };
}

simple_kernel!(SingleLineTextKernel, FieldType::SingleLineText, ColumnType::Text);
simple_kernel!(LongTextKernel, FieldType::LongText, ColumnType::Text);
simple_kernel!(DateKernel, FieldType::Date, ColumnType::Timestamp);
simple_kernel!(DateTimeKernel, FieldType::DateTime, ColumnType::Timestamp);
simple_kernel!(CheckboxKernel, FieldType::Checkbox, ColumnType::Boolean);
simple_kernel!(UserKernel, FieldType::User, ColumnType::Jsonb);
simple_kernel!(AttachmentKernel, FieldType::Attachment, ColumnType::Jsonb);
simple_kernel!(LinkKernel, FieldType::Link, ColumnType::Jsonb);
simple_kernel!(LookupKernel, FieldType::Lookup, ColumnType::Jsonb);
simple_kernel!(CountKernel, FieldType::Count, ColumnType::DoublePrecision);
simple_kernel!(RollupKernel, FieldType::Rollup, ColumnType::DoublePrecision);

struct NumberKernel;

impl FieldKernel for NumberKernel {
    fn field_type(&self) -> FieldType {
        FieldType::Number
    }

    fn validate_options(&self, options: &FieldOptions) -> Result<()> {
        if let FieldOptions::Number { min, max, .. } = options {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(Error::validation("number field min must be <= max"));
                }
            }
            Ok(())
        } else {
            Err(Error::validation("expected Number options"))
        }
    }

    fn column_type(&self, _options: &FieldOptions) -> ColumnType {
        ColumnType::DoublePrecision
    }

    fn normalize_cell(&self, _options: &FieldOptions, value: CellValue) -> Result<CellValue> {
        match &value {
            CellValue::Number(_) | CellValue::Null => Ok(value),
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(CellValue::Number)
                .map_err(|_| Error::validation(format!("'{s}' is not a valid number"))),
            _ => Err(Error::validation("number field requires a numeric value")),
        }
    }
}

struct RatingKernel;

impl FieldKernel for RatingKernel {
    fn field_type(&self) -> FieldType {
        FieldType::Rating
    }

    fn validate_options(&self, options: &FieldOptions) -> Result<()> {
        match options {
            FieldOptions::Rating { max, .. } if *max == 0 => {
                Err(Error::validation("rating field max must be positive"))
            }
            FieldOptions::Rating { .. } => Ok(()),
            _ => Err(Error::validation("expected Rating options")),
        }
    }

    fn column_type(&self, _options: &FieldOptions) -> ColumnType {
        ColumnType::DoublePrecision
    }

    fn normalize_cell(&self, options: &FieldOptions, value: CellValue) -> Result<CellValue> {
        let FieldOptions::Rating { max, .. } = options else {
            return Err(Error::validation("expected Rating options"));
        };
        match value.as_f64() {
            Some(n) if n >= 0.0 && n <= f64::from(*max) => Ok(CellValue::Number(n)),
            Some(_) => Err(Error::validation(format!("rating must be between 0 and {max}"))),
            None if value.is_null() => Ok(CellValue::Null),
            None => Err(Error::validation("rating field requires a numeric value")),
        }
    }
}

struct SelectKernel {
    field_type: FieldType,
}

impl FieldKernel for SelectKernel {
    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn validate_options(&self, options: &FieldOptions) -> Result<()> {
        let choices = match options {
            FieldOptions::SingleSelect { choices } | FieldOptions::MultipleSelect { choices } => {
                choices
            }
            _ => return Err(Error::validation("expected a select options variant")),
        };
        let mut seen = std::collections::HashSet::new();
        for choice in choices {
            if !seen.insert(&choice.id) {
                return Err(Error::validation(format!(
                    "duplicate select choice id {}",
                    choice.id
                )));
            }
        }
        Ok(())
    }

    fn column_type(&self, _options: &FieldOptions) -> ColumnType {
        match self.field_type {
            FieldType::SingleSelect => ColumnType::Text,
            _ => ColumnType::Jsonb,
        }
    }

    fn normalize_cell(&self, options: &FieldOptions, value: CellValue) -> Result<CellValue> {
        let choices = match options {
            FieldOptions::SingleSelect { choices } | FieldOptions::MultipleSelect { choices } => {
                choices
            }
            _ => return Err(Error::validation("expected a select options variant")),
        };
        let valid_ids: std::collections::HashSet<_> = choices.iter().map(|c| c.id.as_str()).collect();
        match &value {
            CellValue::Null => Ok(value),
            CellValue::Text(id) if valid_ids.contains(id.as_str()) => Ok(value),
            CellValue::Array(items) => {
                for item in items {
                    if let CellValue::Text(id) = item {
                        if !valid_ids.contains(id.as_str()) {
                            return Err(Error::validation(format!("unknown select choice {id}")));
                        }
                    }
                }
                Ok(value)
            }
            _ => Err(Error::validation("value is not a valid select choice id")),
        }
    }
}

struct FormulaKernel;

impl FieldKernel for FormulaKernel {
    fn field_type(&self) -> FieldType {
        FieldType::Formula
    }

    fn validate_options(&self, options: &FieldOptions) -> Result<()> {
        match options {
            FieldOptions::Formula { expression } if expression.trim().is_empty() => {
                Err(Error::validation("formula expression must not be empty"))
            }
            FieldOptions::Formula { .. } => Ok(()),
            _ => Err(Error::validation("expected Formula options")),
        }
    }

    fn column_type(&self, _options: &FieldOptions) -> ColumnType {
        // The result type is resolved by the Calculation Engine against
        // the parsed expression, not derivable from the type tag alone
        // (see `FieldType::default_column_type`'s doc comment).
        ColumnType::Jsonb
    }

    fn normalize_cell(&self, _options: &FieldOptions, value: CellValue) -> Result<CellValue> {
        Ok(value)
    }
}

/// Looks up the [`FieldKernel`] for a given [`FieldType`]; built once at
/// startup and shared behind an `Arc`.
pub struct FieldKernelRegistryImpl {
    kernels: HashMap<FieldType, Box<dyn FieldKernel>>,
}

impl FieldKernelRegistryImpl {
    #[must_use]
    pub fn new() -> Self {
        let mut kernels: HashMap<FieldType, Box<dyn FieldKernel>> = HashMap::new();
        kernels.insert(FieldType::SingleLineText, Box::new(SingleLineTextKernel));
        kernels.insert(FieldType::LongText, Box::new(LongTextKernel));
        kernels.insert(FieldType::Number, Box::new(NumberKernel));
        kernels.insert(FieldType::Rating, Box::new(RatingKernel));
        kernels.insert(FieldType::Date, Box::new(DateKernel));
        kernels.insert(FieldType::DateTime, Box::new(DateTimeKernel));
        kernels.insert(FieldType::Checkbox, Box::new(CheckboxKernel));
        kernels.insert(
            FieldType::SingleSelect,
            Box::new(SelectKernel {
                field_type: FieldType::SingleSelect,
            }),
        );
        kernels.insert(
            FieldType::MultipleSelect,
            Box::new(SelectKernel {
                field_type: FieldType::MultipleSelect,
            }),
        );
        kernels.insert(FieldType::User, Box::new(UserKernel));
        kernels.insert(FieldType::Attachment, Box::new(AttachmentKernel));
        kernels.insert(FieldType::Link, Box::new(LinkKernel));
        kernels.insert(FieldType::Formula, Box::new(FormulaKernel));
        kernels.insert(FieldType::Lookup, Box::new(LookupKernel));
        kernels.insert(FieldType::Rollup, Box::new(RollupKernel));
        kernels.insert(FieldType::Count, Box::new(CountKernel));
        Self { kernels }
    }
}

impl Default for FieldKernelRegistryImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldKernelRegistry for FieldKernelRegistryImpl {
    fn kernel_for(&self, field_type: FieldType) -> Option<&dyn FieldKernel> {
        self.kernels.get(&field_type).map(|kernel| kernel.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unbalanced_number_bounds() {
        let kernel = NumberKernel;
        let options = FieldOptions::Number {
            precision: 2,
            format: None,
            min: Some(10.0),
            max: Some(1.0),
        };
        assert!(kernel.validate_options(&options).is_err());
    }

    #[test]
    fn rejects_duplicate_select_choices() {
        use gridbase_domain::entities::SelectChoice;
        let kernel = SelectKernel {
            field_type: FieldType::SingleSelect,
        };
        let options = FieldOptions::SingleSelect {
            choices: vec![
                SelectChoice {
                    id: "a".into(),
                    name: "A".into(),
                    color: None,
                },
                SelectChoice {
                    id: "a".into(),
                    name: "A2".into(),
                    color: None,
                },
            ],
        };
        assert!(kernel.validate_options(&options).is_err());
    }

    #[test]
    fn registry_resolves_every_field_type() {
        let registry = FieldKernelRegistryImpl::new();
        for field_type in [
            FieldType::SingleLineText,
            FieldType::LongText,
            FieldType::Number,
            FieldType::Rating,
            FieldType::Date,
            FieldType::DateTime,
            FieldType::Checkbox,
            FieldType::SingleSelect,
            FieldType::MultipleSelect,
            FieldType::User,
            FieldType::Attachment,
            FieldType::Link,
            FieldType::Formula,
            FieldType::Lookup,
            FieldType::Rollup,
            FieldType::Count,
        ] {
            assert!(registry.kernel_for(field_type).is_some());
        }
    }
}
