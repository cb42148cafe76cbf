//! Submission and withdrawal surfaces.
//!
//! Transport-agnostic: callers (HTTP handlers, CLI) hand in the caller
//! identity and the raw payload and map the returned outcome onto their own
//! status vocabulary. Infrastructure failures are logged here and folded
//! into `InternalError`.

use tracing::{error, info};
use uuid::Uuid;

use crate::ledger::WithdrawOutcome;
use crate::money::Micros;
use crate::order::{CreateOutcome, OrderNumber};
use crate::store::{LedgerStore, OrderRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    AlreadyOwnedByCaller,
    Conflict,
    InvalidFormat,
    InternalError,
}

/// Validate `raw` and register it for `owner`.
pub async fn submit_order<R>(registry: &R, owner: Uuid, raw: &str) -> SubmitOutcome
where
    R: OrderRegistry + ?Sized,
{
    let number = match OrderNumber::parse(raw) {
        Ok(n) => n,
        Err(e) => {
            info!(user_id = %owner, error = %e, "order submission rejected");
            return SubmitOutcome::InvalidFormat;
        }
    };

    match registry.create_order(owner, &number).await {
        Ok(CreateOutcome::Created(order)) => {
            info!(user_id = %owner, order = %number, order_id = order.id, "order accepted");
            SubmitOutcome::Accepted
        }
        Ok(CreateOutcome::AlreadyOwnedByCaller(_)) => SubmitOutcome::AlreadyOwnedByCaller,
        Ok(CreateOutcome::OwnedByOther) => {
            info!(user_id = %owner, order = %number, "order number owned by another user");
            SubmitOutcome::Conflict
        }
        Err(e) => {
            error!(user_id = %owner, order = %number, error = %e, "create_order failed");
            SubmitOutcome::InternalError
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalRequestOutcome {
    Accepted,
    InsufficientFunds,
    InvalidOrderNumber,
    UnknownOrder,
    InvalidAmount,
    InternalError,
}

/// Validate and execute a withdrawal of `amount` against `raw_order`.
pub async fn request_withdrawal<L>(
    ledger: &L,
    owner: Uuid,
    raw_order: &str,
    amount: Micros,
) -> WithdrawalRequestOutcome
where
    L: LedgerStore + ?Sized,
{
    let number = match OrderNumber::parse(raw_order) {
        Ok(n) => n,
        Err(_) => return WithdrawalRequestOutcome::InvalidOrderNumber,
    };
    if !amount.is_positive() {
        return WithdrawalRequestOutcome::InvalidAmount;
    }

    match ledger.create_withdrawal(owner, &number, amount).await {
        Ok(WithdrawOutcome::Accepted(w)) => {
            info!(user_id = %owner, order = %number, amount = %w.amount, "withdrawal created");
            WithdrawalRequestOutcome::Accepted
        }
        Ok(WithdrawOutcome::InsufficientFunds { available }) => {
            info!(
                user_id = %owner,
                requested = %amount,
                available = %available,
                "withdrawal refused: insufficient funds"
            );
            WithdrawalRequestOutcome::InsufficientFunds
        }
        Ok(WithdrawOutcome::OrderUnknown) => WithdrawalRequestOutcome::UnknownOrder,
        Err(e) => {
            error!(user_id = %owner, order = %number, error = %e, "create_withdrawal failed");
            WithdrawalRequestOutcome::InternalError
        }
    }
}
