use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::order::{PaymentMethod, PaymentStatus};
use crate::errors::ServiceError;

/// What the payment step decided for a batch of orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub status: PaymentStatus,
    pub reference: Option<String>,
}

/// Mints a locally-unique payment reference, e.g. `tap_1719302400123`.
pub fn mint_reference(prefix: &str) -> String {
    format!("{}_{}", prefix, Utc::now().timestamp_millis())
}

/// Boundary to the external payment provider. Gateways authorize a charge
/// and return the provider's reference.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        method: PaymentMethod,
        amount: Decimal,
        customer_id: Uuid,
    ) -> Result<String, ServiceError>;
}

/// Gateway used when no provider is configured: mints references locally
/// and always authorizes. Keeps development and tests off the network.
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn authorize(
        &self,
        method: PaymentMethod,
        amount: Decimal,
        customer_id: Uuid,
    ) -> Result<String, ServiceError> {
        let reference = mint_reference(method.as_str());
        info!(
            %customer_id,
            %amount,
            method = method.as_str(),
            reference,
            "Authorized charge offline"
        );
        Ok(reference)
    }
}

#[derive(Serialize)]
struct ChargeRequest {
    method: String,
    amount: Decimal,
    customer_id: Uuid,
}

#[derive(Deserialize)]
struct ChargeResponse {
    reference: String,
}

/// Gateway backed by an HTTP payment provider.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn authorize(
        &self,
        method: PaymentMethod,
        amount: Decimal,
        customer_id: Uuid,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/charges", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&ChargeRequest {
            method: method.as_str().to_string(),
            amount,
            customer_id,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Payment gateway unreachable: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(ServiceError::PaymentFailed(format!(
                "Gateway declined charge with status {}",
                response.status()
            )));
        }

        let body: ChargeResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Malformed gateway response: {}", e))
        })?;

        Ok(body.reference)
    }
}

/// Maps a payment method to its settlement behavior.
///
/// Cash settles on delivery, wallet settles against the internal ledger
/// before this resolver runs, and every other method goes through the
/// configured gateway.
#[derive(Clone)]
pub struct PaymentResolver {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentResolver {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        method: PaymentMethod,
        amount: Decimal,
        customer_id: Uuid,
    ) -> Result<PaymentOutcome, ServiceError> {
        match method {
            PaymentMethod::Cash => Ok(PaymentOutcome {
                status: PaymentStatus::Pending,
                reference: None,
            }),
            PaymentMethod::Wallet => Ok(PaymentOutcome {
                status: PaymentStatus::Paid,
                reference: Some(mint_reference("wallet")),
            }),
            _ => {
                // Gateway charges confirm asynchronously via webhook; the
                // order carries the provider reference and stays pending.
                let reference = self.gateway.authorize(method, amount, customer_id).await?;
                Ok(PaymentOutcome {
                    status: PaymentStatus::Pending,
                    reference: Some(reference),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn resolver() -> PaymentResolver {
        PaymentResolver::new(Arc::new(OfflineGateway))
    }

    #[tokio::test]
    async fn cash_stays_pending_without_reference() {
        let outcome = resolver()
            .resolve(PaymentMethod::Cash, dec!(100.00), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Pending);
        assert!(outcome.reference.is_none());
    }

    #[tokio::test]
    async fn wallet_settles_immediately() {
        let outcome = resolver()
            .resolve(PaymentMethod::Wallet, dec!(100.00), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Paid);
        assert!(outcome.reference.unwrap().starts_with("wallet_"));
    }

    #[tokio::test]
    async fn gateway_method_stays_pending_with_provider_reference() {
        let outcome = resolver()
            .resolve(PaymentMethod::Tap, dec!(100.00), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Pending);
        assert!(outcome.reference.unwrap().starts_with("tap_"));
    }

    #[test]
    fn gateway_classification() {
        assert!(!PaymentMethod::Cash.is_gateway());
        assert!(!PaymentMethod::Wallet.is_gateway());
        assert!(PaymentMethod::Card.is_gateway());
        assert!(PaymentMethod::Tap.is_gateway());
        assert!(PaymentMethod::Hyperpay.is_gateway());
        assert!(PaymentMethod::Tamara.is_gateway());
        assert!(PaymentMethod::Tabby.is_gateway());
    }
}
