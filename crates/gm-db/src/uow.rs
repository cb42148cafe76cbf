use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// One database transaction that order and ledger writes can both join.
///
/// Dropping a unit of work without calling [`commit`](Self::commit) rolls it
/// back, so an early `?` return never leaves a half-applied write behind.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let tx = pool.begin().await.context("begin transaction failed")?;
        Ok(Self { tx })
    }

    /// Connection for the query functions in [`crate::orders`] and
    /// [`crate::ledger`].
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("commit failed")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.context("rollback failed")
    }
}
