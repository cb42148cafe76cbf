//! gm-testkit
//!
//! In-memory stand-ins for the database and the accrual service, plus small
//! fixtures shared by the scenario tests under `tests/` and by the daemon's
//! route tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gm_core::{check_digit, CreateOutcome, LedgerStore, Order, OrderNumber, OrderRegistry};
use gm_reconcile::{ReconcileWorker, WorkerConfig};
use uuid::Uuid;

mod mem_store;
mod scripted_accrual;

pub use mem_store::MemStore;
pub use scripted_accrual::ScriptedAccrual;

/// A Luhn-admissible order number derived from `seed`. Distinct seeds give
/// distinct numbers.
pub fn order_number(seed: u64) -> OrderNumber {
    let payload = format!("4{seed:012}");
    // Payload is all digits by construction.
    let d = check_digit(&payload).unwrap_or(0);
    match OrderNumber::parse(&format!("{payload}{d}")) {
        Ok(n) => n,
        Err(e) => panic!("generated order number is not admissible: {e}"),
    }
}

/// Register a fresh user with a unique login.
pub async fn new_user<L: LedgerStore + ?Sized>(ledger: &L) -> Result<Uuid> {
    let id = Uuid::new_v4();
    ledger
        .register_user(id, &format!("user-{id}"))
        .await
        .context("register test user")?;
    Ok(id)
}

/// Create `number` for `owner`, insisting it is brand new.
pub async fn new_order<R: OrderRegistry + ?Sized>(
    registry: &R,
    owner: Uuid,
    number: &OrderNumber,
) -> Result<Order> {
    match registry.create_order(owner, number).await? {
        CreateOutcome::Created(o) => Ok(o),
        other => anyhow::bail!("expected a new order, got {other:?}"),
    }
}

/// Worker settings for tests: tight interval and timeouts.
pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        interval: Duration::from_millis(20),
        io_timeout: Duration::from_millis(500),
        concurrency: 4,
        batch_limit: 100,
    }
}

/// A worker over `store` and `accrual` with [`fast_worker_config`].
pub fn worker(store: &Arc<MemStore>, accrual: &Arc<ScriptedAccrual>) -> ReconcileWorker {
    ReconcileWorker::new(store.clone(), accrual.clone(), fast_worker_config())
}
