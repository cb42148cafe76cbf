//! Request and response bodies for the gm-daemon HTTP endpoints.
//!
//! No business logic lives here; the `From` impls only reshape domain rows
//! into their wire form.

use chrono::{DateTime, SecondsFormat, Utc};
use gm_core::{Balance, Micros, Order, OrderStatus, Withdrawal};
use serde::{Deserialize, Serialize};

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// /api/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /api/user/orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub number: String,
    pub status: OrderStatus,
    /// Present only once the order is PROCESSED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Micros>,
    pub uploaded_at: String,
}

impl From<Order> for OrderView {
    fn from(o: Order) -> Self {
        Self {
            accrual: (o.status == OrderStatus::Processed).then_some(o.accrual),
            number: o.number,
            status: o.status,
            uploaded_at: rfc3339(o.uploaded_at),
        }
    }
}

// ---------------------------------------------------------------------------
// /api/user/balance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub current: Micros,
    pub withdrawn: Micros,
}

impl From<Balance> for BalanceView {
    fn from(b: Balance) -> Self {
        Self {
            current: b.current,
            withdrawn: b.withdrawn,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Micros,
}

// ---------------------------------------------------------------------------
// /api/user/withdrawals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalView {
    pub order: String,
    pub sum: Micros,
    pub processed_at: String,
}

impl From<Withdrawal> for WithdrawalView {
    fn from(w: Withdrawal) -> Self {
        Self {
            order: w.order_number,
            sum: w.amount,
            processed_at: rfc3339(w.processed_at),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
