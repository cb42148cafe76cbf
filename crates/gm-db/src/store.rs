use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use gm_core::{
    AppliedTransition, Balance, CreateOutcome, LedgerStore, Micros, Order, OrderNumber,
    OrderRegistry, OrderStatus, WithdrawOutcome, Withdrawal,
};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::{ledger, orders, UnitOfWork};

/// PostgreSQL-backed [`OrderRegistry`] + [`LedgerStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn classify_existing(existing: Order, owner: Uuid) -> CreateOutcome {
    if existing.owner == owner {
        CreateOutcome::AlreadyOwnedByCaller(existing)
    } else {
        CreateOutcome::OwnedByOther
    }
}

#[async_trait]
impl OrderRegistry for PgStore {
    async fn create_order(&self, owner: Uuid, number: &OrderNumber) -> Result<CreateOutcome> {
        if let Some(existing) = orders::fetch_by_number(&self.pool, number.as_str()).await? {
            return Ok(classify_existing(existing, owner));
        }

        match orders::insert_new(&self.pool, owner, number).await? {
            Some(order) => Ok(CreateOutcome::Created(order)),
            None => {
                // Lost the race to a concurrent insert of the same number.
                let existing = orders::fetch_by_number(&self.pool, number.as_str())
                    .await?
                    .ok_or_else(|| anyhow!("order {number} vanished after insert conflict"))?;
                Ok(classify_existing(existing, owner))
            }
        }
    }

    async fn order_by_number(&self, number: &str) -> Result<Option<Order>> {
        orders::fetch_by_number(&self.pool, number).await
    }

    async fn orders_by_owner(&self, owner: Uuid) -> Result<Vec<Order>> {
        orders::fetch_by_owner(&self.pool, owner).await
    }

    async fn non_terminal_orders(&self, after_id: i64, limit: i64) -> Result<Vec<Order>> {
        orders::fetch_non_terminal(&self.pool, after_id, limit).await
    }

    async fn apply_transition(
        &self,
        order_id: i64,
        to: OrderStatus,
        accrual: Micros,
    ) -> Result<AppliedTransition> {
        if accrual.is_negative() {
            return Err(anyhow!("negative accrual {accrual} for order id {order_id}"));
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let (owner, from) = orders::lock_for_transition(uow.conn(), order_id)
            .await?
            .ok_or_else(|| anyhow!("order id {order_id} not found"))?;

        if let Err(refused) = from.check_transition(to) {
            uow.rollback().await?;
            return Err(refused.into());
        }

        let credited = if to == OrderStatus::Processed {
            accrual
        } else {
            Micros::ZERO
        };

        let written = orders::update_status(uow.conn(), order_id, to, credited).await?;
        if written != 1 {
            return Err(anyhow!(
                "order id {order_id} left the non-terminal set during transition"
            ));
        }

        if to == OrderStatus::Processed {
            ledger::credit_accrual(uow.conn(), owner, credited)
                .await
                .with_context(|| format!("credit for order id {order_id}"))?;
        }

        uow.commit().await?;
        debug!(order_id, %from, %to, %credited, "transition committed");

        Ok(AppliedTransition {
            order_id,
            owner,
            from,
            to,
            credited,
        })
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn register_user(&self, user_id: Uuid, login: &str) -> Result<bool> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let created = ledger::insert_user(uow.conn(), user_id, login).await?;
        uow.commit().await?;
        Ok(created)
    }

    async fn balance(&self, owner: Uuid) -> Result<Option<Balance>> {
        ledger::fetch_balance(&self.pool, owner).await
    }

    async fn create_withdrawal(
        &self,
        owner: Uuid,
        order_number: &OrderNumber,
        amount: Micros,
    ) -> Result<WithdrawOutcome> {
        if !amount.is_positive() {
            return Err(anyhow!("withdrawal amount must be positive, got {amount}"));
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let target = orders::fetch_by_number(uow.conn(), order_number.as_str()).await?;
        if !matches!(target, Some(ref o) if o.owner == owner) {
            uow.rollback().await?;
            return Ok(WithdrawOutcome::OrderUnknown);
        }

        let balance = ledger::lock_balance(uow.conn(), owner)
            .await?
            .ok_or_else(|| anyhow!("no balance row for user {owner}"))?;

        if balance.current < amount {
            uow.rollback().await?;
            return Ok(WithdrawOutcome::InsufficientFunds {
                available: balance.current,
            });
        }

        ledger::debit_for_withdrawal(uow.conn(), owner, amount).await?;
        let withdrawal = ledger::insert_withdrawal(uow.conn(), owner, order_number, amount).await?;
        uow.commit().await?;

        Ok(WithdrawOutcome::Accepted(withdrawal))
    }

    async fn withdrawals(&self, owner: Uuid) -> Result<Vec<Withdrawal>> {
        ledger::fetch_withdrawals(&self.pool, owner).await
    }
}
