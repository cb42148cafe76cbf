use std::time::Duration;

use gm_accrual::AccrualReply;
use gm_core::{Micros, OrderStatus, TransitionError};

/// What the worker should do with one order after one accrual reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Apply `current -> to`; `accrual` is credited only when `to` is PROCESSED.
    Transition { to: OrderStatus, accrual: Micros },
    /// Reply agrees with what is stored.
    Unchanged,
    /// The accrual service has not seen the order yet.
    NotRegistered,
    /// Throttled; skip this order until `retry_after` has passed.
    Defer { retry_after: Duration },
    /// The reply asks for a move the state machine refuses.
    Reject(TransitionError),
}

/// Pure decision step. No IO, no clock.
pub fn decide(current: OrderStatus, reply: &AccrualReply) -> Decision {
    match reply {
        AccrualReply::NotRegistered => Decision::NotRegistered,
        AccrualReply::RateLimited { retry_after } => Decision::Defer {
            retry_after: *retry_after,
        },
        AccrualReply::Ready(result) => {
            if result.status == current {
                return Decision::Unchanged;
            }
            match current.check_transition(result.status) {
                Ok(()) => Decision::Transition {
                    to: result.status,
                    accrual: if result.status == OrderStatus::Processed {
                        result.accrual
                    } else {
                        Micros::ZERO
                    },
                },
                Err(e) => Decision::Reject(e),
            }
        }
    }
}
