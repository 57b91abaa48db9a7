//! # Unit of Work
//!
//! One SQLite transaction plus typed access to every repository inside it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = db.begin().await?;               ← BEGIN IMMEDIATE       │
//! │                                                                         │
//! │  uow.carts().lock_or_create(user_id, tax, now).await?;   ← row lock     │
//! │  uow.products().get_many(&ids).await?;                                  │
//! │  uow.carts().save(&cart).await?;                                        │
//! │                                                                         │
//! │  uow.commit().await?;        ← or drop / rollback() to undo everything  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories borrow the transaction's connection mutably, so only one is
//! alive at a time and every statement runs inside the same transaction.

use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::{DbError, DbResult};
use crate::repository::{
    CartRepository, OrderRepository, PaymentRepository, ProductRepository, UserRepository,
};

/// An open database transaction.
#[derive(Debug)]
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        UnitOfWork { tx }
    }

    /// Raw connection for statements no repository covers.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub fn users(&mut self) -> UserRepository<'_> {
        UserRepository::new(&mut self.tx)
    }

    pub fn products(&mut self) -> ProductRepository<'_> {
        ProductRepository::new(&mut self.tx)
    }

    pub fn carts(&mut self) -> CartRepository<'_> {
        CartRepository::new(&mut self.tx)
    }

    pub fn orders(&mut self) -> OrderRepository<'_> {
        OrderRepository::new(&mut self.tx)
    }

    pub fn payments(&mut self) -> PaymentRepository<'_> {
        PaymentRepository::new(&mut self.tx)
    }

    /// Commits every statement issued through this unit of work.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    /// Rolls back explicitly. Dropping the unit of work has the same effect.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}
