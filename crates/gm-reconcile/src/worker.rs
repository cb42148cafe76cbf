use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::stream::{self, StreamExt};
use gm_accrual::{AccrualSource, DEFAULT_RETRY_AFTER, MAX_RETRY_AFTER};
use gm_core::{Micros, Order, OrderRegistry, TransitionError};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::decide::{decide, Decision};

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub interval: Duration,
    /// Bound on every accrual query and every storage call.
    pub io_timeout: Duration,
    /// Max in-flight order queries within one tick.
    pub concurrency: usize,
    /// Max orders queried per tick. Orders still inside a rate-limit window
    /// do not count against it.
    pub batch_limit: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            io_timeout: Duration::from_secs(10),
            concurrency: 4,
            batch_limit: 1_000,
        }
    }
}

/// Per-tick counters. `examined` is the number of orders the tick looked at;
/// every examined order
/// lands in exactly one of the other buckets (`credited` is a subset of
/// `transitioned`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub examined: usize,
    pub transitioned: usize,
    pub credited: usize,
    pub unchanged: usize,
    pub not_registered: usize,
    pub rate_limited: usize,
    /// Skipped because an earlier rate limit has not expired yet.
    pub deferred: usize,
    pub failed: usize,
    pub rejected: usize,
}

#[derive(Debug)]
enum OrderOutcome {
    Transitioned { credited: Micros },
    Unchanged,
    NotRegistered,
    RateLimited { order_id: i64, until: Instant },
    Failed,
    Rejected,
}

impl TickReport {
    fn record(&mut self, outcome: &OrderOutcome) {
        match outcome {
            OrderOutcome::Transitioned { credited } => {
                self.transitioned += 1;
                if credited.is_positive() {
                    self.credited += 1;
                }
            }
            OrderOutcome::Unchanged => self.unchanged += 1,
            OrderOutcome::NotRegistered => self.not_registered += 1,
            OrderOutcome::RateLimited { .. } => self.rate_limited += 1,
            OrderOutcome::Failed => self.failed += 1,
            OrderOutcome::Rejected => self.rejected += 1,
        }
    }
}

/// Earliest instant a throttled order may be queried again. The back-off is
/// clamped and the addition checked so no reply can overflow the clock.
fn defer_until(now: Instant, retry_after: Duration) -> Instant {
    now.checked_add(retry_after.min(MAX_RETRY_AFTER))
        .or_else(|| now.checked_add(DEFAULT_RETRY_AFTER))
        .unwrap_or(now)
}

async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| anyhow!("{what} timed out after {limit:?}"))?
}

/// Periodic reconciliation of non-terminal orders against the accrual
/// service.
///
/// One worker per process. Holds no lock across an accrual query: the only
/// write, `apply_transition`, happens after the reply is known.
pub struct ReconcileWorker {
    registry: Arc<dyn OrderRegistry>,
    accrual: Arc<dyn AccrualSource>,
    cfg: WorkerConfig,
    /// order id -> earliest instant the order may be queried again.
    not_before: Mutex<HashMap<i64, Instant>>,
    /// Last order id examined. The next tick resumes after it and wraps to
    /// the start of the backlog, so orders that never settle cannot keep
    /// newer ones out of the batch.
    cursor: AtomicI64,
}

impl ReconcileWorker {
    pub fn new(
        registry: Arc<dyn OrderRegistry>,
        accrual: Arc<dyn AccrualSource>,
        cfg: WorkerConfig,
    ) -> Self {
        Self {
            registry,
            accrual,
            cfg,
            not_before: Mutex::new(HashMap::new()),
            cursor: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    /// One pass over the next window of the non-terminal backlog.
    ///
    /// The window starts after the last order examined by the previous tick
    /// and wraps around, so successive ticks rotate through every
    /// non-terminal order. Errors only when the snapshot itself cannot be
    /// read; per-order failures are counted in the report and never abort
    /// the pass.
    pub async fn tick(&self) -> Result<TickReport> {
        let mut not_before = self.not_before.lock().await;
        let now = Instant::now();
        not_before.retain(|_, until| *until > now);

        // Over-fetch by the number of deferred orders so they do not eat
        // into the batch.
        let limit = self.cfg.batch_limit.max(1);
        let window = limit.saturating_add(i64::try_from(not_before.len()).unwrap_or(i64::MAX));
        let orders = self.load_window(window).await?;

        let mut report = TickReport::default();
        let mut due: Vec<Order> = Vec::new();
        let mut last_seen = None;
        for order in orders {
            if due.len() as i64 >= limit {
                break;
            }
            last_seen = Some(order.id);
            report.examined += 1;
            if not_before.contains_key(&order.id) {
                report.deferred += 1;
            } else {
                due.push(order);
            }
        }
        self.cursor.store(last_seen.unwrap_or(0), Ordering::Relaxed);
        drop(not_before);

        let queries: Vec<_> = due.into_iter().map(|o| self.reconcile_one(o)).collect();
        let outcomes: Vec<OrderOutcome> = stream::iter(queries)
            .buffer_unordered(self.cfg.concurrency.max(1))
            .collect()
            .await;

        let mut not_before = self.not_before.lock().await;
        for outcome in &outcomes {
            report.record(outcome);
            if let OrderOutcome::RateLimited { order_id, until } = outcome {
                not_before.insert(*order_id, *until);
            }
        }

        Ok(report)
    }

    /// Up to `window` non-terminal orders, starting after the cursor and
    /// wrapping to the lowest ids when the tail of the backlog is short.
    async fn load_window(&self, window: i64) -> Result<Vec<Order>> {
        let cursor = self.cursor.load(Ordering::Relaxed);
        let mut orders = bounded(
            self.cfg.io_timeout,
            "non-terminal snapshot",
            self.registry.non_terminal_orders(cursor, window),
        )
        .await
        .context("reconcile tick: load non-terminal orders")?;

        let short = window - orders.len() as i64;
        if cursor > 0 && short > 0 {
            let head = bounded(
                self.cfg.io_timeout,
                "non-terminal snapshot",
                self.registry.non_terminal_orders(0, short),
            )
            .await
            .context("reconcile tick: load non-terminal orders from the start")?;
            orders.extend(head.into_iter().filter(|o| o.id <= cursor));
        }
        Ok(orders)
    }

    async fn reconcile_one(&self, order: Order) -> OrderOutcome {
        let reply = match tokio::time::timeout(
            self.cfg.io_timeout,
            self.accrual.query(&order.number),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(order = %order.number, error = %e, "accrual query failed; retry next tick");
                return OrderOutcome::Failed;
            }
            Err(_) => {
                warn!(order = %order.number, timeout = ?self.cfg.io_timeout, "accrual query timed out; retry next tick");
                return OrderOutcome::Failed;
            }
        };

        match decide(order.status, &reply) {
            Decision::Unchanged => {
                debug!(order = %order.number, status = %order.status, "unchanged");
                OrderOutcome::Unchanged
            }
            Decision::NotRegistered => {
                debug!(order = %order.number, "not registered with accrual service yet");
                OrderOutcome::NotRegistered
            }
            Decision::Defer { retry_after } => {
                info!(order = %order.number, ?retry_after, "accrual service throttled; deferring order");
                OrderOutcome::RateLimited {
                    order_id: order.id,
                    until: defer_until(Instant::now(), retry_after),
                }
            }
            Decision::Reject(e) => {
                warn!(order = %order.number, error = %e, "transition refused");
                OrderOutcome::Rejected
            }
            Decision::Transition { to, accrual } => {
                let applied = bounded(
                    self.cfg.io_timeout,
                    "apply transition",
                    self.registry.apply_transition(order.id, to, accrual),
                )
                .await;
                match applied {
                    Ok(t) => {
                        info!(
                            order = %order.number,
                            user_id = %t.owner,
                            from = %t.from,
                            to = %t.to,
                            credited = %t.credited,
                            "order transitioned"
                        );
                        OrderOutcome::Transitioned { credited: t.credited }
                    }
                    Err(e) if e.downcast_ref::<TransitionError>().is_some() => {
                        warn!(order = %order.number, error = %e, "transition refused by store");
                        OrderOutcome::Rejected
                    }
                    Err(e) => {
                        error!(order = %order.number, error = %format!("{e:#}"), "apply transition failed; retry next tick");
                        OrderOutcome::Failed
                    }
                }
            }
        }
    }

    /// Tick every `interval` until `shutdown` flips to `true` (or its sender
    /// is dropped). A tick already running is allowed to finish; its own IO
    /// is bounded by `io_timeout`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.cfg.interval, concurrency = self.cfg.concurrency, "reconciliation worker started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            match self.tick().await {
                Ok(r) => {
                    if r.examined > 0 {
                        info!(
                            examined = r.examined,
                            transitioned = r.transitioned,
                            credited = r.credited,
                            unchanged = r.unchanged,
                            not_registered = r.not_registered,
                            rate_limited = r.rate_limited,
                            deferred = r.deferred,
                            failed = r.failed,
                            rejected = r.rejected,
                            "reconcile tick"
                        );
                    }
                }
                Err(e) => error!(error = %format!("{e:#}"), "reconcile tick aborted"),
            }
        }
        info!("reconciliation worker stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
