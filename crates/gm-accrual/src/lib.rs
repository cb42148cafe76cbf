//! Client side of the external accrual service.
//!
//! The service is queried by order number and answers with its own status
//! vocabulary. This crate translates that vocabulary into [`OrderStatus`] and
//! sorts every other outcome into one of three buckets: a usable reply, a
//! "try this order later" signal, or a retryable [`AccrualError`]. Nothing in
//! here ever produces a terminal status from an ambiguous answer.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use gm_core::{Micros, OrderStatus};

mod http;

pub use http::HttpAccrualClient;

/// Retry-After fallback when the service throttles without saying for how long.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Longest back-off honoured from a Retry-After header. Larger values are
/// clamped to this.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3_600);

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualResult {
    pub order: String,
    pub status: OrderStatus,
    /// Zero unless `status == Processed`.
    pub accrual: Micros,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualReply {
    Ready(AccrualResult),
    /// The service does not know the order yet.
    NotRegistered,
    /// Throttled; leave this order alone for `retry_after`.
    RateLimited { retry_after: Duration },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Every variant is retryable: the order stays where it is and is asked about
/// again on a later tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualError {
    /// Connect/read failure.
    Transport(String),
    Timeout,
    /// Unexpected HTTP status.
    Status(u16),
    /// The body did not match the wire contract.
    Decode(String),
}

impl fmt::Display for AccrualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccrualError::Transport(m) => write!(f, "accrual transport error: {m}"),
            AccrualError::Timeout => write!(f, "accrual request timed out"),
            AccrualError::Status(code) => write!(f, "accrual service answered HTTP {code}"),
            AccrualError::Decode(m) => write!(f, "accrual response decode error: {m}"),
        }
    }
}

impl std::error::Error for AccrualError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Anything that can answer "what is the accrual state of this order".
#[async_trait]
pub trait AccrualSource: Send + Sync {
    async fn query(&self, order_number: &str) -> Result<AccrualReply, AccrualError>;
}

/// External status → internal status. Unknown values keep the order alive.
pub fn map_external_status(external: &str) -> OrderStatus {
    match external {
        "PROCESSED" => OrderStatus::Processed,
        "INVALID" => OrderStatus::Invalid,
        "PROCESSING" => OrderStatus::Processing,
        _ => OrderStatus::Registered,
    }
}
