//! `gm balance` and `gm withdraw`.

use anyhow::{anyhow, bail, Context, Result};
use gm_core::{LedgerStore, Micros, OrderNumber, WithdrawOutcome};
use uuid::Uuid;

use super::{open_store, print_json};

pub async fn balance(user: Uuid) -> Result<()> {
    let store = open_store().await?;
    let bal = store
        .balance(user)
        .await?
        .ok_or_else(|| anyhow!("unknown user {user}"))?;
    print_json(&bal)
}

pub async fn withdraw(user: Uuid, raw_order: &str, raw_sum: &str) -> Result<()> {
    let number = OrderNumber::parse(raw_order.trim())?;
    let amount = Micros::parse_decimal(raw_sum).with_context(|| format!("invalid --sum {raw_sum:?}"))?;
    if !amount.is_positive() {
        bail!("--sum must be positive");
    }

    let store = open_store().await?;
    match store.create_withdrawal(user, &number, amount).await? {
        WithdrawOutcome::Accepted(w) => {
            println!(
                "order={} sum={} processed_at={}",
                w.order_number,
                w.amount,
                w.processed_at.to_rfc3339()
            );
            Ok(())
        }
        WithdrawOutcome::InsufficientFunds { available } => {
            bail!("insufficient funds: available {available}, requested {amount}")
        }
        WithdrawOutcome::OrderUnknown => bail!("order {number} is not registered to user {user}"),
    }
}
