use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{device_token, order, store};
use crate::errors::ServiceError;

/// Boundary to the push provider. One token, one message.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn push(&self, token: &str, title: &str, body: &str) -> Result<(), ServiceError>;
}

/// Sender used when no FCM key is configured; logs and drops.
pub struct NoopPushSender;

#[async_trait]
impl PushSender for NoopPushSender {
    async fn push(&self, _token: &str, title: &str, _body: &str) -> Result<(), ServiceError> {
        debug!(title, "Push notifications disabled, dropping message");
        Ok(())
    }
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
}

/// Sender backed by FCM's legacy HTTP endpoint.
pub struct FcmPushSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmPushSender {
    pub fn new(
        endpoint: String,
        server_key: String,
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
            endpoint,
            server_key,
        })
    }
}

#[async_trait]
impl PushSender for FcmPushSender {
    async fn push(&self, token: &str, title: &str, body: &str) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&FcmMessage {
                to: token,
                notification: FcmNotification { title, body },
            })
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("FCM unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "FCM rejected push with status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Fans out order notifications to the customer and the affected store
/// owners. Strictly best-effort: every failure is logged and swallowed, the
/// checkout result never depends on a push going through.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DbPool>,
    sender: Arc<dyn PushSender>,
}

impl NotificationService {
    pub fn new(db: Arc<DbPool>, sender: Arc<dyn PushSender>) -> Self {
        Self { db, sender }
    }

    async fn push_to_user(&self, user_id: Uuid, title: &str, body: &str) {
        let token = match device_token::Entity::find_by_id(user_id).one(&*self.db).await {
            Ok(Some(t)) => t.token,
            Ok(None) => {
                debug!(%user_id, "No device token registered, skipping push");
                return;
            }
            Err(e) => {
                warn!(%user_id, "Device token lookup failed: {}", e);
                return;
            }
        };

        if let Err(e) = self.sender.push(&token, title, body).await {
            warn!(%user_id, "Push delivery failed: {}", e);
        }
    }

    /// Notifies the customer and each store owner about freshly created
    /// orders.
    #[instrument(skip(self, orders))]
    pub async fn dispatch_order_created(&self, customer_id: Uuid, orders: &[order::Model]) {
        if orders.is_empty() {
            return;
        }

        let title = "Order confirmed";
        let body = if orders.len() == 1 {
            format!("Your order {} has been placed", orders[0].order_number)
        } else {
            format!("Your {} orders have been placed", orders.len())
        };
        self.push_to_user(customer_id, title, &body).await;

        let store_ids: Vec<Uuid> = orders.iter().map(|o| o.store_id).collect();
        let stores = match store::Entity::find()
            .filter(store::Column::Id.is_in(store_ids))
            .all(&*self.db)
            .await
        {
            Ok(stores) => stores,
            Err(e) => {
                warn!("Store lookup for notifications failed: {}", e);
                return;
            }
        };

        for order in orders {
            let Some(owner_id) = stores
                .iter()
                .find(|s| s.id == order.store_id)
                .map(|s| s.owner_id)
            else {
                continue;
            };
            self.push_to_user(
                owner_id,
                "New order",
                &format!("You received order {}", order.order_number),
            )
            .await;
        }

        info!(%customer_id, orders = orders.len(), "Order notifications dispatched");
    }
}
