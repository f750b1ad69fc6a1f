use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Header carrying the authenticated customer id, set by the edge gateway
/// after it has verified the session token.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// Extractor for the calling customer. Rejects the request when the header
/// is missing or is not a UUID.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCustomer {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCustomer
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing x-customer-id header".to_string())
            })?;

        let id = Uuid::parse_str(raw).map_err(|_| {
            ServiceError::Unauthorized("Invalid customer id".to_string())
        })?;

        Ok(AuthenticatedCustomer { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<AuthenticatedCustomer, ServiceError> {
        let (mut parts, _) = req.into_parts();
        AuthenticatedCustomer::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn accepts_valid_header() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header(CUSTOMER_ID_HEADER, id.to_string())
            .body(())
            .unwrap();
        let customer = extract(req).await.unwrap();
        assert_eq!(customer.id, id);
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let req = Request::builder().body(()).unwrap();
        assert!(extract(req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_malformed_id() {
        let req = Request::builder()
            .header(CUSTOMER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(extract(req).await.is_err());
    }
}
