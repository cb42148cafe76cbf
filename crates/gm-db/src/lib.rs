//! PostgreSQL persistence for orders, balances and withdrawals.
//!
//! Query functions live in [`orders`] and [`ledger`] and take either a pool
//! or a `&mut PgConnection`, so several of them can be composed inside one
//! [`UnitOfWork`]. [`PgStore`] wires them into the `gm-core` store traits.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

pub mod ledger;
pub mod orders;
mod store;
mod uow;

pub use store::PgStore;
pub use uow::UnitOfWork;

pub const ENV_DB_URL: &str = "DATABASE_URI";

/// Pool knobs. `io_timeout` bounds both connection acquisition and every
/// statement (`statement_timeout`) so a wedged database surfaces as an error
/// instead of a hang.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub io_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            io_timeout: Duration::from_secs(10),
        }
    }
}

pub async fn connect(url: &str, settings: PoolSettings) -> Result<PgPool> {
    let opts: PgConnectOptions = url.parse().context("invalid database URL")?;
    let opts = opts.options([(
        "statement_timeout",
        settings.io_timeout.as_millis().to_string(),
    )]);

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.io_timeout)
        .connect_with(opts)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Connect to Postgres using DATABASE_URI.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, PoolSettings::default()).await
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}
