//! `gm reconcile tick`: one pass of the reconciliation worker, outside the
//! daemon. Useful after an outage to drain the backlog by hand.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gm_accrual::HttpAccrualClient;
use gm_reconcile::{ReconcileWorker, WorkerConfig};
use tracing::info;

use super::{open_store, print_json};

pub async fn tick(
    accrual_url: &str,
    io_timeout_ms: u64,
    concurrency: usize,
    batch_limit: i64,
) -> Result<()> {
    gm_config::validate_http_url(accrual_url).context("invalid --accrual")?;
    if io_timeout_ms == 0 || concurrency == 0 || batch_limit <= 0 {
        bail!("--io-timeout-ms, --concurrency and --batch-limit must be > 0");
    }

    let io_timeout = Duration::from_millis(io_timeout_ms);
    let store = Arc::new(open_store().await?);
    let accrual = Arc::new(HttpAccrualClient::new(
        accrual_url.trim_end_matches('/'),
        io_timeout,
    )?);

    let worker = ReconcileWorker::new(
        store,
        accrual,
        WorkerConfig {
            io_timeout,
            concurrency,
            batch_limit,
            ..WorkerConfig::default()
        },
    );
    let report = worker.tick().await?;
    info!(examined = report.examined, transitioned = report.transitioned, "one-shot tick finished");
    print_json(&report)
}
