//! Storage seams.
//!
//! The reconciliation loop, the HTTP surface and the CLI only ever talk to
//! these traits. `gm-db` implements them on PostgreSQL; `gm-testkit`
//! implements them in memory with the same semantics.
//!
//! Implementations must be `Send + Sync` so one store can be shared between
//! the request handlers and the background worker.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::ledger::{Balance, WithdrawOutcome, Withdrawal};
use crate::money::Micros;
use crate::order::{AppliedTransition, CreateOutcome, Order, OrderNumber, OrderStatus};

/// Durable orders and their lifecycle state.
#[async_trait]
pub trait OrderRegistry: Send + Sync {
    /// Idempotent create. Looks the number up first:
    /// - owned by `owner` → [`CreateOutcome::AlreadyOwnedByCaller`]
    /// - owned by someone else → [`CreateOutcome::OwnedByOther`]
    /// - absent → insert with status NEW, zero accrual, `uploaded_at = now`
    async fn create_order(&self, owner: Uuid, number: &OrderNumber) -> Result<CreateOutcome>;

    async fn order_by_number(&self, number: &str) -> Result<Option<Order>>;

    /// Ascending by `uploaded_at`.
    async fn orders_by_owner(&self, owner: Uuid) -> Result<Vec<Order>>;

    /// Bounded snapshot of NEW/REGISTERED/PROCESSING orders with
    /// `id > after_id`, ascending by id. Callers page through the backlog by
    /// passing the last id they saw and wrap to `0` at the end.
    async fn non_terminal_orders(&self, after_id: i64, limit: i64) -> Result<Vec<Order>>;

    /// Move one order to `to`, as a single atomic unit.
    ///
    /// When `to` is PROCESSED the owner's balance is credited with
    /// `accrual` inside the same unit; for any other target the stored
    /// accrual is zero and `accrual` is ignored. If the current status does
    /// not permit the move, the error wraps a
    /// [`TransitionError`](crate::order::TransitionError) and nothing is
    /// written.
    async fn apply_transition(
        &self,
        order_id: i64,
        to: OrderStatus,
        accrual: Micros,
    ) -> Result<AppliedTransition>;
}

/// Balances and the withdrawal history. The only writer of balance figures.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the user and its zeroed balance row together. Returns `false`
    /// when the user already exists (nothing is written).
    async fn register_user(&self, user_id: Uuid, login: &str) -> Result<bool>;

    /// Read-only; `None` when the user has no balance row.
    async fn balance(&self, owner: Uuid) -> Result<Option<Balance>>;

    /// Debit `amount` against an order owned by `owner`.
    ///
    /// The balance check, the order lookup, the debit and the ledger append
    /// are one atomic unit. `amount` must be positive.
    async fn create_withdrawal(
        &self,
        owner: Uuid,
        order_number: &OrderNumber,
        amount: Micros,
    ) -> Result<WithdrawOutcome>;

    /// Ascending by `processed_at`.
    async fn withdrawals(&self, owner: Uuid) -> Result<Vec<Withdrawal>>;
}

/// Everything the HTTP surface needs.
pub trait MartStore: OrderRegistry + LedgerStore {}

impl<T: OrderRegistry + LedgerStore + ?Sized> MartStore for T {}
