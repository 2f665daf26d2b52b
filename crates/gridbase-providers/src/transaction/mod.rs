//! [`TransactionManager`] implementation backed by a real `sea_orm`
//! transaction, spec §4.11/invariant 8. Lives beside the other
//! providers, not in `gridbase-infrastructure`, because it is
//! downcast back to its concrete type by the same crate's
//! `RecordStore`/`LinkEngine` implementations.

use std::any::Any;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::transaction::{Transaction, TransactionManager};

/// Wraps a live `sea_orm` transaction behind the domain's opaque
/// [`Transaction`] marker. `DatabaseTransaction` implements the same
/// `ConnectionTrait` surface as `DatabaseConnection`, so once
/// downcast it is a drop-in replacement for a provider's own `db`
/// field.
pub struct PostgresTransaction {
    pub inner: DatabaseTransaction,
}

impl Transaction for PostgresTransaction {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

pub struct PostgresTransactionManager {
    db: DatabaseConnection,
}

impl PostgresTransactionManager {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionManager for PostgresTransactionManager {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let inner = self.db.begin().await.map_err(|err| Error::Database {
            message: format!("failed to begin transaction: {err}"),
            source: Some(Box::new(err)),
        })?;
        Ok(Box::new(PostgresTransaction { inner }))
    }

    async fn commit(&self, tx: Box<dyn Transaction>) -> Result<()> {
        downcast(tx)?.inner.commit().await.map_err(|err| Error::Database {
            message: format!("failed to commit transaction: {err}"),
            source: Some(Box::new(err)),
        })
    }

    async fn rollback(&self, tx: Box<dyn Transaction>) -> Result<()> {
        downcast(tx)?.inner.rollback().await.map_err(|err| Error::Database {
            message: format!("failed to roll back transaction: {err}"),
            source: Some(Box::new(err)),
        })
    }
}

fn downcast(tx: Box<dyn Transaction>) -> Result<Box<PostgresTransaction>> {
    tx.into_any()
        .downcast::<PostgresTransaction>()
        .map_err(|_| Error::Internal { message: "transaction handle is not a PostgresTransaction".into() })
}

/// Downcast a borrowed transaction handle back to the live `sea_orm`
/// connection every provider executes its queries against.
pub fn connection_of<'a>(tx: &'a dyn Transaction) -> Result<&'a DatabaseTransaction> {
    tx.as_any()
        .downcast_ref::<PostgresTransaction>()
        .map(|t| &t.inner)
        .ok_or_else(|| Error::Internal { message: "transaction handle is not a PostgresTransaction".into() })
}
