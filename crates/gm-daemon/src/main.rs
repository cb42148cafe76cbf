//! gm-daemon entry point.
//!
//! Thin on purpose: configuration, tracing, storage, the reconciliation
//! worker and the HTTP server are wired here; handlers live in `routes.rs`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::Method;
use gm_accrual::HttpAccrualClient;
use gm_config::Config;
use gm_daemon::{routes, shutdown::shutdown_signal, state};
use gm_db::{PgStore, PoolSettings};
use gm_reconcile::{ReconcileWorker, WorkerConfig};
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    init_tracing(&cfg.log_level);

    let pool = gm_db::connect(
        &cfg.database_uri,
        PoolSettings {
            max_connections: cfg.max_db_connections,
            io_timeout: cfg.io_timeout(),
        },
    )
    .await?;
    gm_db::migrate(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let accrual = Arc::new(HttpAccrualClient::new(
        cfg.accrual_base_url(),
        cfg.io_timeout(),
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Arc::new(ReconcileWorker::new(
        store.clone(),
        accrual,
        WorkerConfig {
            interval: cfg.poll_interval(),
            io_timeout: cfg.io_timeout(),
            concurrency: cfg.worker_concurrency,
            batch_limit: cfg.batch_limit,
        },
    ));
    let worker_handle = worker.spawn(shutdown_rx);

    let shared = Arc::new(state::AppState::new(store));
    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_any_origin());

    let addr = cfg.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(accrual = cfg.accrual_base_url(), "gm-daemon listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    info!("http server stopped; waiting for reconciliation worker");
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!(error = %e, "reconciliation worker task failed");
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

/// CORS: any origin, read and submit verbs only.
fn cors_any_origin() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
