use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict").
    pub error: String,
    /// Machine-readable platform error code, when the error maps to one
    /// (e.g., "INSUFFICIENT_STOCK", "CANNOT_CANCEL").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// ISO 8601 timestamp when the error occurred.
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("No valid items in cart")]
    NoValidItems,

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Insufficient wallet balance: {0}")]
    InsufficientWalletBalance(String),

    #[error("Only pending orders can be cancelled")]
    CannotCancel,

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    ///
    /// Conflict-class failures (lost stock race, insufficient wallet balance,
    /// non-pending cancel) map to 409; dependency failures to 502.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::EmptyCart
            | Self::NoValidItems => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_)
            | Self::InsufficientStock(_)
            | Self::InsufficientWalletBalance(_)
            | Self::CannotCancel => StatusCode::CONFLICT,
            Self::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for clients that branch on failure kind.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::EmptyCart => Some("EMPTY_CART"),
            Self::NoValidItems => Some("NO_VALID_ITEMS"),
            Self::InsufficientStock(_) => Some("INSUFFICIENT_STOCK"),
            Self::InsufficientWalletBalance(_) => Some("INSUFFICIENT_WALLET_BALANCE"),
            Self::CannotCancel => Some("CANNOT_CANCEL"),
            Self::PaymentFailed(_) => Some("PAYMENT_FAILED"),
            _ => None,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.error_code().map(str::to_string),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

/// Error type for HTTP handlers; wraps service errors and boundary-level
/// validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::ServiceError(err) => err.into_response(),
            ApiError::ValidationError(msg) => {
                ServiceError::ValidationError(msg).into_response()
            }
            ApiError::NotFound(msg) => ServiceError::NotFound(msg).into_response(),
            ApiError::Unauthorized => {
                ServiceError::Unauthorized("Customer authentication required".into())
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ServiceError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::NoValidItems.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientStock("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InsufficientWalletBalance("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ServiceError::CannotCancel.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::ExternalServiceError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn error_codes_for_checkout_failures() {
        assert_eq!(ServiceError::EmptyCart.error_code(), Some("EMPTY_CART"));
        assert_eq!(
            ServiceError::NoValidItems.error_code(),
            Some("NO_VALID_ITEMS")
        );
        assert_eq!(
            ServiceError::InsufficientStock("p".into()).error_code(),
            Some("INSUFFICIENT_STOCK")
        );
        assert_eq!(
            ServiceError::InsufficientWalletBalance("w".into()).error_code(),
            Some("INSUFFICIENT_WALLET_BALANCE")
        );
        assert_eq!(ServiceError::CannotCancel.error_code(), Some("CANNOT_CANCEL"));
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), None);
    }

    #[test]
    fn internal_errors_hide_details() {
        assert_eq!(
            ServiceError::InternalError("secret pool state".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("Order not found".into()).response_message(),
            "Not found: Order not found"
        );
    }

    #[tokio::test]
    async fn response_body_carries_code() {
        let response = ServiceError::CannotCancel.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.code.as_deref(), Some("CANNOT_CANCEL"));
    }
}
