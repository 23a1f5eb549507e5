//! Order service
//!
//! Composes the order/item repositories. Every read and write resolves the
//! ambient handle immediately before use and never caches it across an
//! await, so the same functions participate in a transaction when wrapped
//! by a transaction boundary and fall back to pooled connections otherwise.

use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;

use super::db::{HandleError, PgUnitOfWork};
use super::fault::{FaultInjector, InjectedFault};
use crate::domain;
use crate::models::OrderWithItems;

/// Request body for order creation.
#[derive(Debug, Deserialize)]
pub struct NewOrder {
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub items: Vec<NewItem>,
}

#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug)]
pub enum OrderError {
    Injected(InjectedFault),
    Handle(HandleError),
    Db(sqlx::Error),
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::Injected(e) => write!(f, "{}", e),
            OrderError::Handle(e) => write!(f, "{}", e),
            OrderError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl From<InjectedFault> for OrderError {
    fn from(e: InjectedFault) -> Self {
        OrderError::Injected(e)
    }
}

impl From<HandleError> for OrderError {
    fn from(e: HandleError) -> Self {
        OrderError::Handle(e)
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        OrderError::Db(e)
    }
}

/// Persist an order and its items.
///
/// Performs one write per row on purpose; wrapped in a transaction boundary
/// the writes commit or roll back together, unwrapped each write stands
/// alone. The fault hook sits on the item-save step so a mid-aggregate
/// failure can be provoked on demand.
pub async fn create_order(
    uow: &PgUnitOfWork,
    fault: &FaultInjector,
    input: NewOrder,
) -> Result<OrderWithItems, OrderError> {
    let handle = uow.current();
    let mut conn = handle.conn().await?;
    let order = domain::orders::insert_order(conn.executor(), input.date, &input.description)
        .await?;
    drop(conn);

    let mut items = Vec::with_capacity(input.items.len());
    for item in &input.items {
        fault.maybe_fail("item save")?;

        let handle = uow.current();
        let mut conn = handle.conn().await?;
        items.push(
            domain::items::insert_item(conn.executor(), order.id, &item.name, item.quantity)
                .await?,
        );
    }

    Ok(OrderWithItems { order, items })
}

/// Fetch one order with its items; `None` when the id is unknown.
pub async fn get_order(uow: &PgUnitOfWork, id: i64) -> Result<Option<OrderWithItems>, OrderError> {
    let handle = uow.current();
    let mut conn = handle.conn().await?;
    let Some(order) = domain::orders::get_order(conn.executor(), id).await? else {
        return Ok(None);
    };
    drop(conn);

    let handle = uow.current();
    let mut conn = handle.conn().await?;
    let items = domain::items::list_for_order(conn.executor(), id).await?;

    Ok(Some(OrderWithItems { order, items }))
}

/// List every order with its items.
pub async fn list_orders(uow: &PgUnitOfWork) -> Result<Vec<OrderWithItems>, OrderError> {
    let handle = uow.current();
    let mut conn = handle.conn().await?;
    let orders = domain::orders::list_orders(conn.executor()).await?;
    drop(conn);

    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        let handle = uow.current();
        let mut conn = handle.conn().await?;
        let items = domain::items::list_for_order(conn.executor(), order.id).await?;
        result.push(OrderWithItems { order, items });
    }

    Ok(result)
}
