pub mod order;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API. The state value is needed up front so the
/// cross-cutting transaction layer can be attached to its route.
pub fn build_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new().merge(order::routes(state))
}
