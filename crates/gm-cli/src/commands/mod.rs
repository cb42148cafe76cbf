//! Command handler modules for the `gm` CLI.
//!
//! Shared helpers live here; command-specific logic lives in the submodules.

pub mod ledger;
pub mod orders;
pub mod reconcile;

use anyhow::{Context, Result};
use gm_db::PgStore;
use serde::Serialize;

/// Connect with `DATABASE_URI` and wrap the pool in a store.
pub async fn open_store() -> Result<PgStore> {
    let pool = gm_db::connect_from_env().await?;
    Ok(PgStore::new(pool))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{s}");
    Ok(())
}
