//! Process configuration for the gophermart daemon.
//!
//! Every setting is a command-line flag with an environment fallback. An
//! explicit flag wins over the environment; the environment wins over the
//! built-in default. `.env.local` is loaded first when present so a dev
//! checkout can keep its DATABASE_URI out of the shell profile.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

pub const ENV_RUN_ADDRESS: &str = "RUN_ADDRESS";
pub const ENV_DATABASE_URI: &str = "DATABASE_URI";
pub const ENV_ACCRUAL_SYSTEM_ADDRESS: &str = "ACCRUAL_SYSTEM_ADDRESS";

pub const DEFAULT_RUN_ADDRESS: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Parser)]
#[command(name = "gm-daemon")]
#[command(about = "Order reconciliation daemon", long_about = None)]
pub struct Config {
    /// HTTP bind address. `:8080` binds every interface.
    #[arg(short = 'a', long, env = ENV_RUN_ADDRESS, default_value = DEFAULT_RUN_ADDRESS)]
    pub run_address: String,

    /// PostgreSQL connection URL.
    #[arg(short = 'd', long, env = ENV_DATABASE_URI)]
    pub database_uri: String,

    /// Base URL of the external accrual service.
    #[arg(short = 'r', long, env = ENV_ACCRUAL_SYSTEM_ADDRESS)]
    pub accrual_system_address: String,

    /// Tracing filter used when RUST_LOG is unset.
    #[arg(short = 'l', long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Reconciliation tick interval.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 5_000)]
    pub poll_interval_ms: u64,

    /// Bound on each accrual request and each storage write.
    #[arg(long, env = "IO_TIMEOUT_MS", default_value_t = 10_000)]
    pub io_timeout_ms: u64,

    /// Max in-flight accrual queries per tick.
    #[arg(long, env = "WORKER_CONCURRENCY", default_value_t = 4)]
    pub worker_concurrency: usize,

    /// Max non-terminal orders pulled per tick.
    #[arg(long, env = "BATCH_LIMIT", default_value_t = 1_000)]
    pub batch_limit: i64,

    #[arg(long, env = "MAX_DB_CONNECTIONS", default_value_t = 10)]
    pub max_db_connections: u32,
}

impl Config {
    /// Load `.env.local` (if any), parse the process arguments and validate.
    pub fn load() -> Result<Self> {
        load_dotenv();
        let cfg = Config::try_parse().context("parse configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll interval must be > 0");
        }
        if self.io_timeout_ms == 0 {
            bail!("io timeout must be > 0");
        }
        if self.worker_concurrency == 0 {
            bail!("worker concurrency must be > 0");
        }
        if self.batch_limit <= 0 {
            bail!("batch limit must be > 0");
        }
        if self.max_db_connections == 0 {
            bail!("max db connections must be > 0");
        }
        if self.database_uri.trim().is_empty() {
            bail!("{ENV_DATABASE_URI} is empty");
        }
        self.bind_addr()?;
        validate_http_url(&self.accrual_system_address)
            .with_context(|| format!("invalid {ENV_ACCRUAL_SYSTEM_ADDRESS}"))?;
        Ok(())
    }

    /// Resolve `run_address` to a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let normalized = normalize_bind_address(&self.run_address);
        normalized
            .to_socket_addrs()
            .with_context(|| format!("invalid run address: {}", self.run_address))?
            .next()
            .ok_or_else(|| anyhow!("run address resolved to nothing: {}", self.run_address))
    }

    /// Accrual base URL without a trailing slash.
    pub fn accrual_base_url(&self) -> &str {
        self.accrual_system_address.trim_end_matches('/')
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Load `.env.local` if present. Silent when the file does not exist;
/// production injects env vars directly.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
}

/// `:8080` is shorthand for every interface on port 8080.
pub fn normalize_bind_address(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    }
}

pub fn validate_http_url(raw: &str) -> Result<()> {
    let rest = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))
        .ok_or_else(|| anyhow!("expected an http(s) URL, got {raw:?}"))?;
    if rest.trim_matches('/').is_empty() {
        bail!("URL has no host: {raw:?}");
    }
    Ok(())
}
