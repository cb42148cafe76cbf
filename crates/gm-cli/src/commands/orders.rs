//! `gm user ...` and `gm order ...`.

use anyhow::{bail, Result};
use gm_core::{CreateOutcome, LedgerStore, OrderNumber, OrderRegistry};
use uuid::Uuid;

use super::open_store;

pub async fn user_create(login: &str, id: Option<Uuid>) -> Result<()> {
    let login = login.trim();
    if login.is_empty() {
        bail!("--login must not be empty");
    }
    let id = id.unwrap_or_else(Uuid::new_v4);

    let store = open_store().await?;
    if !store.register_user(id, login).await? {
        bail!("user {id} already exists");
    }
    println!("user_id={id}");
    println!("login={login}");
    Ok(())
}

/// Validation runs before any connection is attempted, so a malformed number
/// fails fast even without a database.
pub async fn submit(user: Uuid, raw: &str) -> Result<()> {
    let number = OrderNumber::parse(raw.trim())?;

    let store = open_store().await?;
    match store.create_order(user, &number).await? {
        CreateOutcome::Created(o) => {
            println!("order_id={} number={} status={} created=true", o.id, o.number, o.status.as_str());
        }
        CreateOutcome::AlreadyOwnedByCaller(o) => {
            println!("order_id={} number={} status={} created=false", o.id, o.number, o.status.as_str());
        }
        CreateOutcome::OwnedByOther => {
            bail!("order {number} is already registered to another user");
        }
    }
    Ok(())
}

pub async fn list(user: Uuid) -> Result<()> {
    let store = open_store().await?;
    let orders = store.orders_by_owner(user).await?;
    if orders.is_empty() {
        println!("orders=0");
        return Ok(());
    }
    for o in orders {
        println!(
            "number={} status={} accrual={} uploaded_at={}",
            o.number,
            o.status.as_str(),
            o.accrual,
            o.uploaded_at.to_rfc3339()
        );
    }
    Ok(())
}
