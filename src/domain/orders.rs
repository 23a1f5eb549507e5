//! Order domain - DB queries for orders
//!
//! All functions use the generic Executor pattern, so they run on whatever
//! connection the ambient handle resolves to - a shared transaction or a
//! pooled connection.

use chrono::NaiveDate;
use sqlx::{Executor, Postgres};

use crate::models::Order;

pub async fn insert_order<'e, E>(
    executor: E,
    date: NaiveDate,
    description: &str,
) -> Result<Order, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO orders (order_date, description)
        VALUES ($1, $2)
        RETURNING id, order_date, description
        "#,
    )
    .bind(date)
    .bind(description)
    .fetch_one(executor)
    .await
}

/// Get one order by id; `None` when it does not exist.
pub async fn get_order<'e, E>(executor: E, id: i64) -> Result<Option<Order>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, order_date, description FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_orders<'e, E>(executor: E) -> Result<Vec<Order>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, order_date, description FROM orders ORDER BY id")
        .fetch_all(executor)
        .await
}
