//! gm-reconcile
//!
//! The reconciliation loop: pull non-terminal orders, ask the accrual service
//! about each one, and push whatever changed through the order registry.
//!
//! - [`decide`] is pure: current status + accrual reply in, [`Decision`] out.
//! - [`ReconcileWorker`] owns the IO: snapshot, bounded-concurrency queries,
//!   timeouts, per-order rate-limit deferral and the periodic timer.

mod decide;
mod worker;

pub use decide::{decide, Decision};
pub use worker::{ReconcileWorker, TickReport, WorkerConfig};
