pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::json;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::carts::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::discounts::DiscountService;
use crate::services::inventory::InventoryService;
use crate::services::ledger::LedgerService;
use crate::services::notifications::{
    FcmPushSender, NoopPushSender, NotificationService, PushSender,
};
use crate::services::orders::OrderService;
use crate::services::payments::{HttpPaymentGateway, OfflineGateway, PaymentGateway, PaymentResolver};

/// All wired service instances, cheap to clone.
#[derive(Clone)]
pub struct AppServices {
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub ledger: LedgerService,
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub services: AppServices,
}

/// Wires the service graph from configuration. Picks HTTP implementations
/// for the payment gateway and push sender when they are configured, and
/// offline stand-ins otherwise.
pub fn build_services(
    db: Arc<DbPool>,
    config: &AppConfig,
    event_sender: EventSender,
) -> Result<AppServices, ServiceError> {
    let gateway: Arc<dyn PaymentGateway> = match &config.gateway_base_url {
        Some(base_url) => Arc::new(HttpPaymentGateway::new(
            base_url.clone(),
            config.gateway_api_key.clone(),
            Duration::from_secs(config.gateway_timeout_secs),
        )?),
        None => Arc::new(OfflineGateway),
    };

    let push_sender: Arc<dyn PushSender> = match &config.fcm_server_key {
        Some(key) => Arc::new(FcmPushSender::new(
            config.fcm_endpoint.clone(),
            key.clone(),
            Duration::from_secs(config.gateway_timeout_secs),
        )?),
        None => Arc::new(NoopPushSender),
    };

    let point_value = Decimal::from_f64(config.point_value).unwrap_or(Decimal::ZERO);
    let shipping_fee =
        Decimal::from_f64(config.shipping_fee_per_store).unwrap_or(Decimal::ZERO);
    let reward_rate = Decimal::from_f64(config.reward_rate).unwrap_or(Decimal::ZERO);

    let carts = CartService::new(db.clone());
    let discounts = DiscountService::new(db.clone(), point_value);
    let payments = PaymentResolver::new(gateway);
    let ledger = LedgerService::new(db.clone(), event_sender.clone());
    let inventory = InventoryService::new(db.clone());
    let orders = OrderService::new(
        db.clone(),
        inventory.clone(),
        ledger.clone(),
        event_sender.clone(),
    );
    let notifications = NotificationService::new(db, push_sender);

    let checkout = CheckoutService::new(
        carts.clone(),
        discounts,
        payments,
        ledger.clone(),
        inventory,
        orders.clone(),
        notifications,
        event_sender,
        shipping_fee,
        reward_rate,
        config.currency.clone(),
    );

    Ok(AppServices {
        carts,
        checkout,
        orders,
        ledger,
    })
}

/// Versioned API routes.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/wallet", handlers::ledger::wallet_routes())
        .nest("/points", handlers::ledger::points_routes())
}

/// Full application router without middleware layers; the binary adds
/// tracing, CORS, and timeouts on top.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /status — readiness probe including a database ping.
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    Json(json!({
        "status": if database == "up" { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}
