//! Formula parsing/evaluation and the [`CalculationEngine`] that drives
//! Formula/Lookup/Rollup/Count recomputation (spec §4.7).
//!
//! The formula grammar is intentionally small: field references
//! (`{field-uuid}`), numeric and string literals, the four arithmetic
//! operators, comparisons, `AND`/`OR`/`NOT`, and a handful of
//! functions (`SUM`, `AVG`, `MIN`, `MAX`, `CONCATENATE`, `UPPER`,
//! `LOWER`, `IF`, `LEN`, `NOW`, `DATE`, `YEAR`, `MONTH`, `DAYS`). It is
//! enough to drive the Rollup/Lookup/Count evaluation paths and
//! straightforward derived columns without pulling in a
//! general-purpose expression crate the rest of the stack has no other
//! use for.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc};
use regex::Regex;

use gridbase_domain::entities::{AggregationFunc, Field, FieldOptions, FieldType};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::calculation_engine::{CalculationEngine, EvaluationMode};
use gridbase_domain::ports::metadata_store::MetadataStore;
use gridbase_domain::ports::record_store::RecordStore;
use gridbase_domain::value_objects::{CellValue, FieldId, RecordId, TableId};

mod lexer;
mod parser;

use parser::Expr;

/// Evaluates formulas and the three link-derived virtual field kinds
/// against a [`RecordStore`], persisting results via
/// [`RecordStore::update_record`].
pub struct CalculationEngineImpl {
    records: Arc<dyn RecordStore>,
    metadata: Arc<dyn MetadataStore>,
    field_ref_pattern: Regex,
}

impl CalculationEngineImpl {
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            records,
            metadata,
            // Matches `{<uuid>}` field references inside a formula body.
            field_ref_pattern: Regex::new(
                r"\{([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\}",
            )
            .expect("field reference pattern is a valid regex literal"),
        }
    }

    fn referenced_fields(&self, expression: &str) -> Vec<FieldId> {
        self.field_ref_pattern
            .captures_iter(expression)
            .filter_map(|c| FieldId::parse(&c[1]).ok())
            .collect()
    }

    /// Resolve a Link-field cell on `record` to the linked table id and
    /// the set of peer record ids it currently references, spec §4.7's
    /// prerequisite for Lookup/Rollup/Count evaluation.
    async fn resolve_link_targets(
        &self,
        record: &gridbase_domain::entities::Record,
        link_field_id: FieldId,
    ) -> Result<(TableId, Vec<RecordId>)> {
        let link_field = self.metadata.find_field(link_field_id).await?.ok_or_else(|| {
            Error::Computation {
                field_id: link_field_id.to_string(),
                message: "link field referenced by a virtual field no longer exists".into(),
            }
        })?;
        let Some((linked_table_id, ..)) = link_field.as_link_options() else {
            return Err(Error::Computation {
                field_id: link_field_id.to_string(),
                message: "referenced field is not a link field".into(),
            });
        };
        let target_ids = record
            .data
            .get(&link_field_id)
            .map(CellValue::link_ids)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| RecordId::parse(&id).ok())
            .collect();
        Ok((*linked_table_id, target_ids))
    }

    /// Fetch `lookup_field_id` off every target record in `table_id`.
    async fn fetch_peer_values(
        &self,
        table_id: TableId,
        target_ids: &[RecordId],
        lookup_field_id: FieldId,
    ) -> Result<Vec<CellValue>> {
        let mut values = Vec::with_capacity(target_ids.len());
        for &target_id in target_ids {
            if let Some(peer) = self.records.find_record(table_id, target_id).await? {
                values.push(peer.data.get(&lookup_field_id).cloned().unwrap_or(CellValue::Null));
            }
        }
        Ok(values)
    }

    /// The pure computation shared by [`CalculationEngine::evaluate`]
    /// (batch/incremental, persists) and
    /// [`CalculationEngine::evaluate_for_record`] (single record,
    /// caller persists as part of its own transaction).
    async fn compute_value(&self, record: &gridbase_domain::entities::Record, field: &Field) -> Result<CellValue> {
        match &field.options {
            FieldOptions::Formula { expression } => self.evaluate_formula(expression, &record.data),
            FieldOptions::Count { link_field_id } => {
                let (_, target_ids) = self.resolve_link_targets(record, *link_field_id).await?;
                Ok(CellValue::Number(target_ids.len() as f64))
            }
            FieldOptions::Lookup { link_field_id, lookup_field_id } => {
                let (linked_table_id, target_ids) = self.resolve_link_targets(record, *link_field_id).await?;
                let mut peer_values =
                    self.fetch_peer_values(linked_table_id, &target_ids, *lookup_field_id).await?;
                Ok(match peer_values.len() {
                    0 => CellValue::Null,
                    1 => peer_values.remove(0),
                    _ => CellValue::Array(peer_values),
                })
            }
            FieldOptions::Rollup { link_field_id, rollup_field_id, aggregation_func } => {
                let (linked_table_id, target_ids) = self.resolve_link_targets(record, *link_field_id).await?;
                let peer_values =
                    self.fetch_peer_values(linked_table_id, &target_ids, *rollup_field_id).await?;
                let numbers: Vec<f64> = peer_values.iter().filter_map(CellValue::as_f64).collect();
                Ok(CellValue::Number(apply_aggregation(*aggregation_func, &numbers)))
            }
            _ => Err(Error::Computation {
                field_id: field.id.to_string(),
                message: "evaluate called on a non-virtual field type".into(),
            }),
        }
    }
}

#[async_trait]
impl CalculationEngine for CalculationEngineImpl {
    async fn evaluate(
        &self,
        tx: &dyn gridbase_domain::ports::transaction::Transaction,
        table_id: TableId,
        field: &Field,
        record_ids: &[RecordId],
        mode: EvaluationMode,
    ) -> Result<u64> {
        let targets: Vec<RecordId> = match mode {
            EvaluationMode::Incremental => record_ids.to_vec(),
            EvaluationMode::Batch => {
                let mut offset = 0i64;
                let mut all = Vec::new();
                loop {
                    let page = self.records.list_records(table_id, offset, 500).await?;
                    let count = page.records.len();
                    all.extend(page.records.into_iter().map(|r| r.id));
                    if count < 500 {
                        break;
                    }
                    offset += 500;
                }
                all
            }
        };

        let mut updated = 0u64;
        for record_id in targets {
            let Some(record) = self.records.find_record(table_id, record_id).await? else {
                continue;
            };
            let value = self.compute_value(&record, field).await?;

            let mut changes = BTreeMap::new();
            changes.insert(field.id, value);
            self.records
                .update_record(tx, table_id, record_id, &changes, record.version)
                .await?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn evaluate_for_record(
        &self,
        record: &gridbase_domain::entities::Record,
        field: &Field,
    ) -> Result<CellValue> {
        self.compute_value(record, field).await
    }

    fn validate_formula(
        &self,
        expression: &str,
        field_types: &[(FieldId, FieldType)],
    ) -> Result<()> {
        let ast = parser::parse(expression)?;
        let known: std::collections::HashSet<FieldId> =
            field_types.iter().map(|(id, _)| *id).collect();
        for field_id in self.referenced_fields(expression) {
            if !known.contains(&field_id) {
                return Err(Error::Validation {
                    message: format!("formula references unknown field {field_id}"),
                });
            }
        }
        let _ = ast;
        Ok(())
    }

    fn evaluate_formula(
        &self,
        expression: &str,
        values: &BTreeMap<FieldId, CellValue>,
    ) -> Result<CellValue> {
        let ast = parser::parse(expression)?;
        eval_expr(&ast, values)
    }
}

fn eval_expr(expr: &Expr, values: &BTreeMap<FieldId, CellValue>) -> Result<CellValue> {
    match expr {
        Expr::Number(n) => Ok(CellValue::Number(*n)),
        Expr::Text(s) => Ok(CellValue::Text(s.clone())),
        Expr::Bool(b) => Ok(CellValue::Bool(*b)),
        Expr::FieldRef(field_id) => Ok(values.get(field_id).cloned().unwrap_or(CellValue::Null)),
        Expr::Not(inner) => Ok(CellValue::Bool(!truthy(&eval_expr(inner, values)?))),
        Expr::BinOp { op, lhs, rhs } => {
            let lhs = eval_expr(lhs, values)?;
            let rhs = eval_expr(rhs, values)?;
            eval_binop(*op, lhs, rhs)
        }
        Expr::Call { name, args } => {
            let evaluated: Result<Vec<_>> = args.iter().map(|a| eval_expr(a, values)).collect();
            eval_call(name, evaluated?)
        }
    }
}

fn truthy(value: &CellValue) -> bool {
    match value {
        CellValue::Null => false,
        CellValue::Bool(b) => *b,
        CellValue::Number(n) => *n != 0.0,
        CellValue::Text(s) => !s.is_empty(),
        other => !other.is_empty(),
    }
}

fn eval_binop(op: parser::BinOp, lhs: CellValue, rhs: CellValue) -> Result<CellValue> {
    use parser::BinOp::{Add, And, Div, Eq, Gt, Gte, Lt, Lte, Mul, Neq, Or, Sub};

    match op {
        Add | Sub | Mul | Div => {
            let a = lhs.as_f64().ok_or_else(|| Error::Computation {
                field_id: "formula".into(),
                message: "arithmetic operand is not numeric".into(),
            })?;
            let b = rhs.as_f64().ok_or_else(|| Error::Computation {
                field_id: "formula".into(),
                message: "arithmetic operand is not numeric".into(),
            })?;
            let result = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => {
                    if b == 0.0 {
                        return Err(Error::Computation {
                            field_id: "formula".into(),
                            message: "division by zero".into(),
                        });
                    }
                    a / b
                }
                _ => unreachable!(),
            };
            Ok(CellValue::Number(result))
        }
        Eq => Ok(CellValue::Bool(cell_eq(&lhs, &rhs))),
        Neq => Ok(CellValue::Bool(!cell_eq(&lhs, &rhs))),
        Gt | Gte | Lt | Lte => {
            let a = lhs.as_f64().ok_or_else(|| Error::Computation {
                field_id: "formula".into(),
                message: "comparison operand is not numeric".into(),
            })?;
            let b = rhs.as_f64().ok_or_else(|| Error::Computation {
                field_id: "formula".into(),
                message: "comparison operand is not numeric".into(),
            })?;
            let result = match op {
                Gt => a > b,
                Gte => a >= b,
                Lt => a < b,
                Lte => a <= b,
                _ => unreachable!(),
            };
            Ok(CellValue::Bool(result))
        }
        And => Ok(CellValue::Bool(truthy(&lhs) && truthy(&rhs))),
        Or => Ok(CellValue::Bool(truthy(&lhs) || truthy(&rhs))),
    }
}

fn cell_eq(a: &CellValue, b: &CellValue) -> bool {
    serde_json::to_value(a).ok() == serde_json::to_value(b).ok()
}

/// Reduce a Rollup field's peer values per spec §4.7. Empty input
/// reduces to `0.0` for every function, including Min/Max — a Rollup
/// with no linked records has nothing to aggregate, not an error.
fn apply_aggregation(func: AggregationFunc, values: &[f64]) -> f64 {
    match func {
        AggregationFunc::Sum => values.iter().sum(),
        AggregationFunc::Count => values.len() as f64,
        AggregationFunc::Avg => {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        }
        AggregationFunc::Min => {
            if values.is_empty() {
                0.0
            } else {
                values.iter().copied().fold(f64::INFINITY, f64::min)
            }
        }
        AggregationFunc::Max => {
            if values.is_empty() {
                0.0
            } else {
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
        }
    }
}

fn eval_call(name: &str, args: Vec<CellValue>) -> Result<CellValue> {
    match name.to_ascii_uppercase().as_str() {
        "SUM" => {
            let total: f64 = args.iter().filter_map(CellValue::as_f64).sum();
            Ok(CellValue::Number(total))
        }
        "AVG" => {
            let numbers: Vec<f64> = args.iter().filter_map(CellValue::as_f64).collect();
            let avg = if numbers.is_empty() {
                0.0
            } else {
                numbers.iter().sum::<f64>() / numbers.len() as f64
            };
            Ok(CellValue::Number(avg))
        }
        "MIN" => {
            let numbers: Vec<f64> = args.iter().filter_map(CellValue::as_f64).collect();
            Ok(CellValue::Number(numbers.into_iter().fold(f64::INFINITY, f64::min)))
        }
        "MAX" => {
            let numbers: Vec<f64> = args.iter().filter_map(CellValue::as_f64).collect();
            Ok(CellValue::Number(numbers.into_iter().fold(f64::NEG_INFINITY, f64::max)))
        }
        "CONCATENATE" => {
            let joined = args
                .iter()
                .map(render_as_text)
                .collect::<Vec<_>>()
                .join("");
            Ok(CellValue::Text(joined))
        }
        "UPPER" => {
            let text = args.first().map(render_as_text).unwrap_or_default();
            Ok(CellValue::Text(text.to_uppercase()))
        }
        "LOWER" => {
            let text = args.first().map(render_as_text).unwrap_or_default();
            Ok(CellValue::Text(text.to_lowercase()))
        }
        "LEN" => {
            let len = args.first().map_or(0, |v| render_as_text(v).chars().count());
            Ok(CellValue::Number(len as f64))
        }
        "IF" => {
            let [cond, then_v, else_v] = <[CellValue; 3]>::try_from(args).map_err(|_| {
                Error::Computation {
                    field_id: "formula".into(),
                    message: "IF expects exactly 3 arguments".into(),
                }
            })?;
            Ok(if truthy(&cond) { then_v } else { else_v })
        }
        "NOW" => Ok(CellValue::DateTime(Utc::now())),
        "DATE" => {
            let [y, m, d] = <[CellValue; 3]>::try_from(args).map_err(|_| Error::Computation {
                field_id: "formula".into(),
                message: "DATE expects exactly 3 arguments (year, month, day)".into(),
            })?;
            let (year, month, day) = (
                y.as_f64().unwrap_or_default() as i32,
                m.as_f64().unwrap_or_default() as u32,
                d.as_f64().unwrap_or_default() as u32,
            );
            let date = Utc
                .with_ymd_and_hms(year, month, day, 0, 0, 0)
                .single()
                .ok_or_else(|| Error::Computation {
                    field_id: "formula".into(),
                    message: "DATE arguments do not form a valid calendar date".into(),
                })?;
            Ok(CellValue::DateTime(date))
        }
        "YEAR" => Ok(CellValue::Number(f64::from(date_arg(&args)?.year()))),
        "MONTH" => Ok(CellValue::Number(f64::from(date_arg(&args)?.month()))),
        "DAYS" => {
            let [end, start] = <[CellValue; 2]>::try_from(args).map_err(|_| Error::Computation {
                field_id: "formula".into(),
                message: "DAYS expects exactly 2 arguments (end, start)".into(),
            })?;
            let end = as_datetime(&end)?;
            let start = as_datetime(&start)?;
            Ok(CellValue::Number((end - start).num_days() as f64))
        }
        other => Err(Error::Computation {
            field_id: "formula".into(),
            message: format!("unknown function {other}"),
        }),
    }
}

fn as_datetime(value: &CellValue) -> Result<chrono::DateTime<Utc>> {
    match value {
        CellValue::DateTime(dt) => Ok(*dt),
        _ => Err(Error::Computation {
            field_id: "formula".into(),
            message: "expected a date/time argument".into(),
        }),
    }
}

fn date_arg(args: &[CellValue]) -> Result<chrono::DateTime<Utc>> {
    let value = args.first().ok_or_else(|| Error::Computation {
        field_id: "formula".into(),
        message: "expected a date/time argument".into(),
    })?;
    as_datetime(value)
}

fn render_as_text(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_arithmetic() {
        let values = BTreeMap::new();
        let result = parser::parse("1 + 2 * 3")
            .and_then(|ast| eval_expr(&ast, &values))
            .unwrap();
        assert_eq!(result.as_f64(), Some(7.0));
    }

    #[test]
    fn evaluates_field_reference() {
        let field_id = FieldId::new();
        let mut values = BTreeMap::new();
        values.insert(field_id, CellValue::Number(4.0));
        let expr = format!("{{{field_id}}} * 2");
        let result = parser::parse(&expr)
            .and_then(|ast| eval_expr(&ast, &values))
            .unwrap();
        assert_eq!(result.as_f64(), Some(8.0));
    }

    #[test]
    fn evaluates_if_and_concat() {
        let values = BTreeMap::new();
        let result = parser::parse(r#"IF(1 > 0, CONCATENATE("a", "b"), "c")"#)
            .and_then(|ast| eval_expr(&ast, &values))
            .unwrap();
        assert!(matches!(result, CellValue::Text(ref s) if s == "ab"));
    }

    #[test]
    fn evaluates_text_functions() {
        let values = BTreeMap::new();
        let result = parser::parse(r#"UPPER(CONCATENATE("ab", LOWER("CD")))"#)
            .and_then(|ast| eval_expr(&ast, &values))
            .unwrap();
        assert!(matches!(result, CellValue::Text(ref s) if s == "ABCD"));
    }

    #[test]
    fn aggregates_rollup_values() {
        assert_eq!(apply_aggregation(AggregationFunc::Sum, &[1.0, 2.0, 3.0]), 6.0);
        assert_eq!(apply_aggregation(AggregationFunc::Avg, &[2.0, 4.0]), 3.0);
        assert_eq!(apply_aggregation(AggregationFunc::Min, &[2.0, -1.0, 4.0]), -1.0);
        assert_eq!(apply_aggregation(AggregationFunc::Max, &[]), 0.0);
    }

    #[test]
    fn rejects_division_by_zero() {
        let values = BTreeMap::new();
        let err = parser::parse("1 / 0")
            .and_then(|ast| eval_expr(&ast, &values))
            .unwrap_err();
        assert!(matches!(err, Error::Computation { .. }));
    }
}
