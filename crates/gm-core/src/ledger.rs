//! Balance and withdrawal rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::money::Micros;

/// One user's balance row.
///
/// Invariant: `current >= 0` and `current + withdrawn` equals the sum of
/// every accrual ever credited to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    #[serde(skip)]
    pub owner: Uuid,
    pub current: Micros,
    pub withdrawn: Micros,
}

impl Balance {
    pub fn zero(owner: Uuid) -> Self {
        Self {
            owner,
            current: Micros::ZERO,
            withdrawn: Micros::ZERO,
        }
    }

    /// `current + withdrawn`: everything ever credited.
    pub fn lifetime_credited(&self) -> Micros {
        self.current + self.withdrawn
    }
}

/// Append-only withdrawal ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub owner: Uuid,
    pub order_number: String,
    pub amount: Micros,
    pub processed_at: DateTime<Utc>,
}

/// Result of `LedgerStore::create_withdrawal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Accepted(Withdrawal),
    /// Balance left unchanged; `available` is what the check saw.
    InsufficientFunds { available: Micros },
    /// No order with that number belongs to the caller.
    OrderUnknown,
}
