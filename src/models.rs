//! Shared data models
//!
//! The Order/Item aggregate: an order owns zero-or-more items. These exist
//! to exercise the unit-of-work mechanism; they carry no behavior.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    #[sqlx(rename = "order_date")]
    pub date: NaiveDate,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub quantity: i32,
}

/// One order together with its dependent rows.
#[derive(Debug, Clone)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<Item>,
}
