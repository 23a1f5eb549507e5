//! Order endpoints (/v1/order)
//!
//! The two creation routes persist the same aggregate through the same
//! service; they differ only in how the transaction boundary is applied.
//! `firstWay` wraps the service call explicitly, `secondWay` relies on the
//! cross-cutting layer wrapping the whole handler.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::models::OrderWithItems;
use crate::services::error::LogErr;
use crate::services::orders::{self, NewOrder};
use crate::services::tx;
use crate::AppState;

/// Order API response DTO
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i64,
    pub name: String,
    pub quantity: i32,
}

impl From<OrderWithItems> for OrderResponse {
    fn from(o: OrderWithItems) -> Self {
        Self {
            id: o.order.id,
            date: o.order.date,
            description: o.order.description,
            items: o
                .items
                .into_iter()
                .map(|i| ItemResponse {
                    id: i.id,
                    name: i.name,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }
}

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/order", get(list_orders))
        .route("/v1/order/{id}", get(get_order))
        .route("/v1/order/firstWay", post(create_order_first_way))
        .route(
            "/v1/order/secondWay",
            post(create_order_second_way)
                .layer(middleware::from_fn_with_state(state, tx::around_handler)),
        )
}

/// GET /v1/order - List all orders with their items
async fn list_orders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderResponse>>, StatusCode> {
    let orders = orders::list_orders(&state.uow)
        .await
        .log_500("List orders error")?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /v1/order/{id} - One order with its items
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, StatusCode> {
    let order = orders::get_order(&state.uow, id)
        .await
        .log_500("Get order error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(order.into()))
}

/// POST /v1/order/firstWay - Create an order, explicit transaction boundary
async fn create_order_first_way(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewOrder>,
) -> Result<Json<OrderResponse>, StatusCode> {
    let created = tx::run(
        &state.uow,
        orders::create_order(&state.uow, &state.fault, input),
    )
    .await
    .log_500("Create order error (explicit transaction)")?;

    Ok(Json(created.into()))
}

/// POST /v1/order/secondWay - Create an order, transaction applied as a
/// route layer (see `tx::around_handler`)
async fn create_order_second_way(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewOrder>,
) -> Result<Json<OrderResponse>, StatusCode> {
    let created = orders::create_order(&state.uow, &state.fault, input)
        .await
        .log_500("Create order error (wrapped handler)")?;

    Ok(Json(created.into()))
}
