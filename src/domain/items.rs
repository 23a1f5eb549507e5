//! Item domain - DB queries for order items

use sqlx::{Executor, Postgres};

use crate::models::Item;

pub async fn insert_item<'e, E>(
    executor: E,
    order_id: i64,
    name: &str,
    quantity: i32,
) -> Result<Item, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO items (order_id, name, quantity)
        VALUES ($1, $2, $3)
        RETURNING id, order_id, name, quantity
        "#,
    )
    .bind(order_id)
    .bind(name)
    .bind(quantity)
    .fetch_one(executor)
    .await
}

pub async fn list_for_order<'e, E>(executor: E, order_id: i64) -> Result<Vec<Item>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, order_id, name, quantity FROM items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(executor)
        .await
}
