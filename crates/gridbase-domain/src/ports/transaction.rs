//! Transaction boundary, spec §4.11/invariant 8. Kept free of any
//! concrete driver type so the domain crate never depends on
//! `sea_orm` — providers downcast [`Transaction`] back to their own
//! connection type via [`Transaction::as_any`].

use std::any::Any;

use async_trait::async_trait;

use crate::error::Result;

/// An open unit-of-work handle. Opaque to everything above
/// `gridbase-providers`; a provider that needs to run a query inside
/// `tx` downcasts it back to its own concrete transaction type.
pub trait Transaction: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Opens/closes the transaction a use case wraps its Record
/// Store/Link Engine/Calculation Engine calls in, so a partial
/// failure rolls every one of them back together (spec §4.11).
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
    async fn commit(&self, tx: Box<dyn Transaction>) -> Result<()>;
    async fn rollback(&self, tx: Box<dyn Transaction>) -> Result<()>;
}
