//! Concrete implementations of the domain's computation ports. These
//! hold no external I/O dependency and are unit-testable in isolation.

mod calculation_engine;
mod dependency_graph;
mod field_kernel;

pub use calculation_engine::CalculationEngineImpl;
pub use dependency_graph::PetgraphDependencyGraph;
pub use field_kernel::FieldKernelRegistryImpl;
