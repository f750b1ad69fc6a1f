use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedCustomer;
use crate::entities::order::{self, OrderStatus};
use crate::entities::order_item;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response, PaginatedResponse};
use crate::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct OrderListParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Order routes, all scoped to the calling customer.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
}

/// GET /orders — the customer's orders, newest first.
async fn list_orders(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Query(params): Query<OrderListParams>,
) -> Result<Response, ApiError> {
    let per_page = params.per_page.clamp(1, 100);
    let (orders, total) = state
        .services
        .orders
        .list_orders(customer.id, params.status, params.page.max(1), per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        params.page.max(1),
        per_page,
        total,
    )))
}

/// GET /orders/:id — one order with its items.
async fn get_order(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (found, items) = state
        .services
        .orders
        .get_order(id, customer.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(OrderDetailResponse {
        order: found,
        items,
    }))
}

/// POST /orders/:id/cancel — cancel a pending order.
async fn cancel_order(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let cancelled = state
        .services
        .orders
        .cancel_order(id, customer.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cancelled))
}
