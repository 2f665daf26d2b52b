//! C4/C6 orchestration — spec §4.4/§4.6: composes the Field Kernel
//! registry (option validation + physical column type), the Schema
//! Provider (the column itself), and the Dependency Graph Builder
//! (registering the edges a virtual field's recompute order depends
//! on, rejecting the definition outright if it would introduce a
//! cycle) behind one `create_field` use case, so nothing can define a
//! Formula/Lookup/Rollup/Count field whose dependencies are unknown to
//! [`DependencyGraphBuilder::recomputation_order`].

use std::sync::Arc;

use chrono::Utc;

use gridbase_domain::entities::{DependencyType, Field, FieldOptions, FieldType};
use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::dependency_graph::{DependencyEdge, DependencyGraphBuilder};
use gridbase_domain::ports::field_kernel::FieldKernelRegistry;
use gridbase_domain::ports::metadata_store::MetadataStore;
use gridbase_domain::ports::schema_provider::SchemaProvider;
use gridbase_domain::schema::ColumnDef;
use gridbase_domain::value_objects::FieldId;

pub struct FieldService {
    schema: Arc<dyn SchemaProvider>,
    metadata: Arc<dyn MetadataStore>,
    dependency_graph: Arc<dyn DependencyGraphBuilder>,
    field_kernels: Arc<dyn FieldKernelRegistry>,
}

impl FieldService {
    #[must_use]
    pub fn new(
        schema: Arc<dyn SchemaProvider>,
        metadata: Arc<dyn MetadataStore>,
        dependency_graph: Arc<dyn DependencyGraphBuilder>,
        field_kernels: Arc<dyn FieldKernelRegistry>,
    ) -> Self {
        Self {
            schema,
            metadata,
            dependency_graph,
            field_kernels,
        }
    }

    /// Add a field to `table_id`. `formula_dependencies` names the
    /// fields a `Formula` expression references (the parser validates
    /// the expression itself via
    /// [`gridbase_domain::ports::CalculationEngine::validate_formula`]
    /// before this is called; this use case only wires the resulting
    /// edges into the dependency graph). Lookup/Rollup/Count fields
    /// derive their own edges from `options` directly.
    pub async fn create_field(
        &self,
        table_id: gridbase_domain::value_objects::TableId,
        name: String,
        field_type: FieldType,
        options: FieldOptions,
        formula_dependencies: Vec<FieldId>,
        created_by: String,
    ) -> Result<Field> {
        let table = self
            .metadata
            .find_table(table_id)
            .await?
            .ok_or_else(|| Error::not_found("table", table_id.to_string()))?;

        let kernel = self.field_kernels.kernel_for(field_type).ok_or_else(|| Error::Internal {
            message: format!("no field kernel registered for {field_type:?}"),
        })?;
        kernel.validate_options(&options)?;
        let db_field_type = kernel.column_type(&options);

        let field_id = FieldId::new();
        let db_field_name = format!("f_{}", field_id.as_uuid().simple());

        let field = Field {
            id: field_id,
            table_id,
            name,
            field_type,
            db_field_name: db_field_name.clone(),
            db_field_type,
            options,
            is_computed: field_type.is_virtual(),
            is_lookup: matches!(field_type, FieldType::Lookup),
            field_order: 0.0,
            is_pending: false,
            has_error: false,
            lookup_options_snapshot: None,
            created_by,
            created_time: Utc::now(),
            deleted_time: None,
        };

        self.schema
            .add_column(
                table.base_id,
                table_id,
                ColumnDef {
                    name: db_field_name,
                    type_: db_field_type,
                    primary_key: false,
                    unique: false,
                    not_null: false,
                    default: None,
                },
            )
            .await?;

        let mut edges: Vec<DependencyEdge> = formula_dependencies
            .into_iter()
            .map(|source_field_id| DependencyEdge {
                source_field_id,
                dependent_field_id: field_id,
                dependency_type: DependencyType::Formula,
            })
            .collect();
        edges.extend(derived_dependency_edges(&field));

        if !edges.is_empty() {
            // Rejects with `Error::Computation` on a cycle (spec §4.6);
            // the field is never persisted in that case.
            self.dependency_graph.set_dependencies(field_id, edges).await?;
        }

        self.metadata.save_field(&field).await?;
        Ok(field)
    }

    pub async fn delete_field(&self, field_id: FieldId) -> Result<()> {
        let field = self
            .metadata
            .find_field(field_id)
            .await?
            .ok_or_else(|| Error::not_found("field", field_id.to_string()))?;
        let table = self
            .metadata
            .find_table(field.table_id)
            .await?
            .ok_or_else(|| Error::not_found("table", field.table_id.to_string()))?;

        self.dependency_graph.remove_field(field_id).await?;
        self.schema.drop_column(table.base_id, field.table_id, &field.db_field_name).await?;
        self.metadata.soft_delete_field(field_id).await
    }
}

/// Edges implied by a Lookup/Rollup/Count field's own options — both
/// the Link field it reads through and the source field on the far
/// side of the link, since a change to either must trigger recompute.
fn derived_dependency_edges(field: &Field) -> Vec<DependencyEdge> {
    match &field.options {
        FieldOptions::Lookup { link_field_id, lookup_field_id } => vec![
            DependencyEdge {
                source_field_id: *link_field_id,
                dependent_field_id: field.id,
                dependency_type: DependencyType::Link,
            },
            DependencyEdge {
                source_field_id: *lookup_field_id,
                dependent_field_id: field.id,
                dependency_type: DependencyType::Lookup,
            },
        ],
        FieldOptions::Rollup { link_field_id, rollup_field_id, .. } => vec![
            DependencyEdge {
                source_field_id: *link_field_id,
                dependent_field_id: field.id,
                dependency_type: DependencyType::Link,
            },
            DependencyEdge {
                source_field_id: *rollup_field_id,
                dependent_field_id: field.id,
                dependency_type: DependencyType::Rollup,
            },
        ],
        FieldOptions::Count { link_field_id } => vec![DependencyEdge {
            source_field_id: *link_field_id,
            dependent_field_id: field.id,
            dependency_type: DependencyType::Count,
        }],
        _ => Vec::new(),
    }
}
