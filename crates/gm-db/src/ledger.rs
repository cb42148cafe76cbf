//! `users`, `user_balances` and `withdrawals` queries.
//!
//! Balance figures are only ever changed by [`credit_accrual`] and
//! [`debit_for_withdrawal`]; both are meant to run inside a
//! [`UnitOfWork`](crate::UnitOfWork) together with the write they belong to.

use anyhow::{anyhow, Context, Result};
use gm_core::{Balance, Micros, OrderNumber, Withdrawal};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

fn balance_from_row(row: &PgRow) -> Result<Balance> {
    Ok(Balance {
        owner: row.try_get("user_id")?,
        current: Micros::new(row.try_get("current_micros")?),
        withdrawn: Micros::new(row.try_get("withdrawn_micros")?),
    })
}

fn withdrawal_from_row(row: &PgRow) -> Result<Withdrawal> {
    Ok(Withdrawal {
        owner: row.try_get("user_id")?,
        order_number: row.try_get("order_number")?,
        amount: Micros::new(row.try_get("amount_micros")?),
        processed_at: row.try_get("processed_at")?,
    })
}

/// Insert the user and its zeroed balance row. `false` when the id or the
/// login is already taken; nothing is written in that case.
pub async fn insert_user(conn: &mut PgConnection, user_id: Uuid, login: &str) -> Result<bool> {
    let res = sqlx::query(
        r#"
        insert into users (id, login, created_at)
        values ($1, $2, now())
        on conflict do nothing
        "#,
    )
    .bind(user_id)
    .bind(login)
    .execute(&mut *conn)
    .await
    .context("insert user failed")?;

    if res.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        insert into user_balances (user_id, current_micros, withdrawn_micros)
        values ($1, 0, 0)
        "#,
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .context("insert balance row failed")?;

    Ok(true)
}

pub async fn fetch_balance<'e, E>(exec: E, owner: Uuid) -> Result<Option<Balance>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        select user_id, current_micros, withdrawn_micros
        from user_balances
        where user_id = $1
        "#,
    )
    .bind(owner)
    .fetch_optional(exec)
    .await
    .context("fetch balance failed")?;

    row.as_ref().map(balance_from_row).transpose()
}

/// Read the balance row and hold its lock until the transaction ends.
pub async fn lock_balance(conn: &mut PgConnection, owner: Uuid) -> Result<Option<Balance>> {
    let row = sqlx::query(
        r#"
        select user_id, current_micros, withdrawn_micros
        from user_balances
        where user_id = $1
        for update
        "#,
    )
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await
    .context("lock balance failed")?;

    row.as_ref().map(balance_from_row).transpose()
}

/// `current += amount` in a single statement.
pub async fn credit_accrual(conn: &mut PgConnection, owner: Uuid, amount: Micros) -> Result<()> {
    if amount.is_negative() {
        return Err(anyhow!("refusing negative credit {amount} for user {owner}"));
    }

    let res = sqlx::query(
        r#"
        update user_balances
        set current_micros = current_micros + $2
        where user_id = $1
        "#,
    )
    .bind(owner)
    .bind(amount.raw())
    .execute(&mut *conn)
    .await
    .context("credit accrual failed")?;

    if res.rows_affected() != 1 {
        return Err(anyhow!("no balance row for user {owner}"));
    }
    Ok(())
}

/// `current -= amount; withdrawn += amount`. The caller has already checked
/// funds under [`lock_balance`]; the CHECK constraint is the backstop.
pub async fn debit_for_withdrawal(
    conn: &mut PgConnection,
    owner: Uuid,
    amount: Micros,
) -> Result<()> {
    let res = sqlx::query(
        r#"
        update user_balances
        set current_micros = current_micros - $2,
            withdrawn_micros = withdrawn_micros + $2
        where user_id = $1
        "#,
    )
    .bind(owner)
    .bind(amount.raw())
    .execute(&mut *conn)
    .await
    .context("debit balance failed")?;

    if res.rows_affected() != 1 {
        return Err(anyhow!("no balance row for user {owner}"));
    }
    Ok(())
}

pub async fn insert_withdrawal(
    conn: &mut PgConnection,
    owner: Uuid,
    order_number: &OrderNumber,
    amount: Micros,
) -> Result<Withdrawal> {
    let row = sqlx::query(
        r#"
        insert into withdrawals (user_id, order_number, amount_micros, processed_at)
        values ($1, $2, $3, now())
        returning user_id, order_number, amount_micros, processed_at
        "#,
    )
    .bind(owner)
    .bind(order_number.as_str())
    .bind(amount.raw())
    .fetch_one(&mut *conn)
    .await
    .context("insert withdrawal failed")?;

    withdrawal_from_row(&row)
}

/// Ascending by `processed_at`.
pub async fn fetch_withdrawals<'e, E>(exec: E, owner: Uuid) -> Result<Vec<Withdrawal>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        select user_id, order_number, amount_micros, processed_at
        from withdrawals
        where user_id = $1
        order by processed_at asc, id asc
        "#,
    )
    .bind(owner)
    .fetch_all(exec)
    .await
    .context("fetch withdrawals failed")?;

    rows.iter().map(withdrawal_from_row).collect()
}
