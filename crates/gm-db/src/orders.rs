//! `orders` table queries.

use anyhow::{Context, Result};
use gm_core::{Micros, Order, OrderNumber, OrderStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

fn order_from_row(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        number: row.try_get("order_number")?,
        owner: row.try_get("user_id")?,
        status: OrderStatus::parse(&row.try_get::<String, _>("status")?)?,
        accrual: Micros::new(row.try_get("accrual_micros")?),
        uploaded_at: row.try_get("uploaded_at")?,
    })
}

pub async fn fetch_by_number<'e, E>(exec: E, number: &str) -> Result<Option<Order>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        select id, order_number, user_id, status, accrual_micros, uploaded_at
        from orders
        where order_number = $1
        "#,
    )
    .bind(number)
    .fetch_optional(exec)
    .await
    .context("fetch order by number failed")?;

    row.as_ref().map(order_from_row).transpose()
}

/// Ascending by `uploaded_at`; `id` breaks ties between same-instant inserts.
pub async fn fetch_by_owner<'e, E>(exec: E, owner: Uuid) -> Result<Vec<Order>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        select id, order_number, user_id, status, accrual_micros, uploaded_at
        from orders
        where user_id = $1
        order by uploaded_at asc, id asc
        "#,
    )
    .bind(owner)
    .fetch_all(exec)
    .await
    .context("fetch orders by owner failed")?;

    rows.iter().map(order_from_row).collect()
}

/// Bounded snapshot of NEW/REGISTERED/PROCESSING orders, oldest first.
/// Keyset page over the non-terminal set, ascending by id.
pub async fn fetch_non_terminal<'e, E>(exec: E, after_id: i64, limit: i64) -> Result<Vec<Order>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        select id, order_number, user_id, status, accrual_micros, uploaded_at
        from orders
        where status in ('NEW','REGISTERED','PROCESSING')
          and id > $1
        order by id asc
        limit $2
        "#,
    )
    .bind(after_id)
    .bind(limit)
    .fetch_all(exec)
    .await
    .context("fetch non-terminal orders failed")?;

    rows.iter().map(order_from_row).collect()
}

/// Insert a NEW order. Returns `None` when the number already exists (the
/// unique constraint absorbed the insert).
pub async fn insert_new<'e, E>(exec: E, owner: Uuid, number: &OrderNumber) -> Result<Option<Order>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        insert into orders (order_number, user_id, status, accrual_micros, uploaded_at)
        values ($1, $2, 'NEW', 0, now())
        on conflict (order_number) do nothing
        returning id, order_number, user_id, status, accrual_micros, uploaded_at
        "#,
    )
    .bind(number.as_str())
    .bind(owner)
    .fetch_optional(exec)
    .await
    .context("insert order failed")?;

    row.as_ref().map(order_from_row).transpose()
}

/// Lock one order row for the rest of the transaction and return its owner
/// and current status.
pub async fn lock_for_transition(
    conn: &mut PgConnection,
    order_id: i64,
) -> Result<Option<(Uuid, OrderStatus)>> {
    let row = sqlx::query(
        r#"
        select user_id, status
        from orders
        where id = $1
        for update
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .context("lock order failed")?;

    match row {
        None => Ok(None),
        Some(row) => {
            let owner: Uuid = row.try_get("user_id")?;
            let status = OrderStatus::parse(&row.try_get::<String, _>("status")?)?;
            Ok(Some((owner, status)))
        }
    }
}

/// Write the new status and accrual. The predicate re-checks that the row is
/// still non-terminal; returns the number of rows written (0 or 1).
pub async fn update_status(
    conn: &mut PgConnection,
    order_id: i64,
    to: OrderStatus,
    accrual: Micros,
) -> Result<u64> {
    let res = sqlx::query(
        r#"
        update orders
        set status = $2,
            accrual_micros = $3
        where id = $1
          and status in ('NEW','REGISTERED','PROCESSING')
        "#,
    )
    .bind(order_id)
    .bind(to.as_str())
    .bind(accrual.raw())
    .execute(&mut *conn)
    .await
    .context("update order status failed")?;

    Ok(res.rows_affected())
}
