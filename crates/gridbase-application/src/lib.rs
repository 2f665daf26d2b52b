//! Application layer: use-case orchestration and the concrete
//! implementations of the domain's computation-oriented ports
//! (Dependency Graph, Calculation Engine, Field Kernel registry).
//!
//! This crate depends only on `gridbase-domain` — it knows nothing
//! about Postgres, Redis, or axum, and is wired against `Arc<dyn
//! Trait>` port objects supplied by `gridbase-providers` and
//! `gridbase-infrastructure` at composition time.

pub mod services;
pub mod use_cases;

pub use services::{
    CalculationEngineImpl, FieldKernelRegistryImpl, PetgraphDependencyGraph,
};
pub use use_cases::{BaseService, FieldService, LinkFieldService, RecordService, TableService};
