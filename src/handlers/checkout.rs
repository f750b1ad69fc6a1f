use axum::{extract::State, response::Response, routing::post, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthenticatedCustomer;
use crate::entities::order::{self, PaymentMethod};
use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::services::checkout::CheckoutInput;
use crate::services::discounts::DiscountBreakdown;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    /// Shipping address snapshot, stored verbatim on each order.
    pub shipping_address: serde_json::Value,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub coupon_code: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub use_points: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub orders: Vec<order::Model>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub discounts: DiscountBreakdown,
    pub reward_points: i64,
}

/// Checkout routes: a read-only dry run and the real thing.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate_checkout))
        .route("/", post(create_checkout))
}

/// POST /checkout/validate — classify the cart without changing anything.
async fn validate_checkout(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<Response, ApiError> {
    let preview = state
        .services
        .checkout
        .validate(customer.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(preview))
}

/// POST /checkout — run the full checkout and create one order per store.
async fn create_checkout(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;

    if !payload.shipping_address.is_object() {
        return Err(ApiError::ValidationError(
            "shipping_address must be an object".to_string(),
        ));
    }

    let payment_method = payload.payment_method;
    let outcome = state
        .services
        .checkout
        .checkout(
            customer.id,
            CheckoutInput {
                shipping_address: payload.shipping_address,
                payment_method,
                notes: payload.notes,
                coupon_code: payload.coupon_code,
                use_points: payload.use_points,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(CheckoutResponse {
        orders: outcome.orders,
        total_amount: outcome.grand_total,
        payment_method,
        discounts: outcome.discounts,
        reward_points: outcome.reward_points,
    }))
}
