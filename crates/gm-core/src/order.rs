//! Order identity and lifecycle state machine.
//!
//! # State diagram
//!
//! ```text
//!                 ┌──────────────► REGISTERED ──┐
//!                 │                    │        │
//!   submit ──► NEW ──────────────► PROCESSING ──┼──► PROCESSED (term.)
//!                 │                             │
//!                 └─────────────────────────────┴──► INVALID   (term.)
//! ```
//!
//! Any non-terminal state may move forward to any later state, including
//! straight from NEW to PROCESSED when the accrual service has already
//! finished. Two moves are refused: anything into NEW, and the regression
//! PROCESSING → REGISTERED. PROCESSED and INVALID are terminal; every
//! transition out of them is a [`TransitionError::Terminal`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::luhn;
use crate::money::Micros;

// ---------------------------------------------------------------------------
// OrderNumber
// ---------------------------------------------------------------------------

/// A validated, Luhn-admissible order number.
///
/// The only constructor is [`OrderNumber::parse`], so holding one proves the
/// number passed the validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn parse(raw: &str) -> Result<Self, InvalidOrderNumber> {
        if luhn::is_admissible(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidOrderNumber(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOrderNumber(pub String);

impl fmt::Display for InvalidOrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid order number: {:?}", self.0)
    }
}

impl std::error::Error for InvalidOrderNumber {}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// Statuses the reconciliation loop still has to chase.
    pub const NON_TERMINAL: [OrderStatus; 3] = [
        OrderStatus::New,
        OrderStatus::Registered,
        OrderStatus::Processing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Registered => "REGISTERED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    /// Parse the stored (internal) vocabulary. Unknown strings are an error;
    /// the lenient mapping of the accrual service's vocabulary lives in the
    /// accrual client, not here.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "REGISTERED" => Ok(OrderStatus::Registered),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(anyhow::anyhow!("invalid order status: {other}")),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Check whether `self -> to` is a legal lifecycle move.
    ///
    /// A same-state move out of a non-terminal state is accepted (it is a
    /// no-op for the caller to skip).
    pub fn check_transition(self, to: OrderStatus) -> Result<(), TransitionError> {
        use OrderStatus::*;

        if self.is_terminal() {
            return Err(TransitionError::Terminal { from: self, to });
        }
        match (self, to) {
            (_, New) if self != New => Err(TransitionError::Illegal { from: self, to }),
            (Processing, Registered) => Err(TransitionError::Illegal { from: self, to }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// A lifecycle move the state machine refuses.
///
/// Never applied, not even partially. The reconciliation loop counts these
/// as rejected and logs them; the order row is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The order is already PROCESSED or INVALID.
    Terminal { from: OrderStatus, to: OrderStatus },
    /// Non-terminal, but the move goes backwards.
    Illegal { from: OrderStatus, to: OrderStatus },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::Terminal { from, to } => {
                write!(f, "order is terminal: {from} -> {to} refused")
            }
            TransitionError::Illegal { from, to } => {
                write!(f, "illegal order transition: {from} -> {to}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Rows and outcomes
// ---------------------------------------------------------------------------

/// One persisted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Storage key; the worker addresses transitions by it.
    pub id: i64,
    pub number: String,
    pub owner: Uuid,
    pub status: OrderStatus,
    /// Zero unless `status == Processed`.
    pub accrual: Micros,
    pub uploaded_at: DateTime<Utc>,
}

/// Result of `OrderRegistry::create_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Order),
    /// Same number, same owner: idempotent success, no new row.
    AlreadyOwnedByCaller(Order),
    /// Same number, different owner: conflict, nothing written.
    OwnedByOther,
}

/// What `apply_transition` actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedTransition {
    pub order_id: i64,
    pub owner: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Amount added to the owner's balance (zero unless `to == Processed`).
    pub credited: Micros,
}
