use axum::{extract::State, response::Response, routing::post, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedCustomer;
use crate::entities::wallet::WalletOwnerType;
use crate::entities::wallet_transaction::WalletTransactionKind;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response};
use crate::AppState;

/// Largest single deposit accepted in one call.
const MAX_DEPOSIT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepositRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointsGrantRequest {
    pub points: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WalletBalanceResponse {
    pub balance: Decimal,
    pub transaction_id: uuid::Uuid,
}

#[derive(Debug, Serialize)]
pub struct PointsBalanceResponse {
    pub balance: i64,
    pub transaction_id: uuid::Uuid,
}

/// Wallet routes.
pub fn wallet_routes() -> Router<AppState> {
    Router::new().route("/deposit", post(deposit))
}

/// Points routes.
pub fn points_routes() -> Router<AppState> {
    Router::new().route("/grant", post(grant_points))
}

/// POST /wallet/deposit — credit the customer's wallet.
async fn deposit(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<DepositRequest>,
) -> Result<Response, ApiError> {
    if payload.amount <= Decimal::ZERO || payload.amount > MAX_DEPOSIT {
        return Err(ApiError::ValidationError(format!(
            "Deposit amount must be between 0 and {}",
            MAX_DEPOSIT
        )));
    }

    let tx = state
        .services
        .ledger
        .credit_wallet(
            customer.id,
            WalletOwnerType::Customer,
            payload.amount,
            WalletTransactionKind::Deposit,
            "wallet_deposit",
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(WalletBalanceResponse {
        balance: tx.balance_after,
        transaction_id: tx.id,
    }))
}

/// POST /points/grant — credit loyalty points to the customer's account.
async fn grant_points(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<PointsGrantRequest>,
) -> Result<Response, ApiError> {
    if payload.points <= 0 {
        return Err(ApiError::ValidationError(
            "Points grant must be positive".to_string(),
        ));
    }

    let reason = payload.reason.as_deref().unwrap_or("manual_grant");
    let tx = state
        .services
        .ledger
        .earn_points(customer.id, payload.points, reason)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PointsBalanceResponse {
        balance: tx.balance_after,
        transaction_id: tx.id,
    }))
}
