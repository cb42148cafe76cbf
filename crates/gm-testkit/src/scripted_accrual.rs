//! Deterministic [`AccrualSource`] fake.
//!
//! Each order number has a queue of scripted answers consumed one per query.
//! An exhausted (or never scripted) queue answers `NotRegistered`, the same
//! thing the real service says about an order it has never seen.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use gm_accrual::{AccrualError, AccrualReply, AccrualResult, AccrualSource};
use gm_core::{Micros, OrderStatus};

type Scripted = Result<AccrualReply, AccrualError>;

#[derive(Default)]
struct Script {
    replies: HashMap<String, VecDeque<Scripted>>,
    calls: HashMap<String, usize>,
}

#[derive(Default)]
pub struct ScriptedAccrual {
    script: Mutex<Script>,
    delay: Option<Duration>,
}

impl ScriptedAccrual {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            script: Mutex::default(),
            delay: Some(delay),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, order: &str, reply: Scripted) {
        self.lock()
            .replies
            .entry(order.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn push_ready(&self, order: &str, status: OrderStatus, accrual: Micros) {
        self.push(
            order,
            Ok(AccrualReply::Ready(AccrualResult {
                order: order.to_string(),
                status,
                accrual,
            })),
        );
    }

    pub fn push_error(&self, order: &str, err: AccrualError) {
        self.push(order, Err(err));
    }

    /// Number of queries seen for `order`.
    pub fn calls(&self, order: &str) -> usize {
        self.lock().calls.get(order).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AccrualSource for ScriptedAccrual {
    async fn query(&self, order_number: &str) -> Result<AccrualReply, AccrualError> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let mut s = self.lock();
        *s.calls.entry(order_number.to_string()).or_default() += 1;
        s.replies
            .get_mut(order_number)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(AccrualReply::NotRegistered))
    }
}
