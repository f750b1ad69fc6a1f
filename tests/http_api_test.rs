mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{seed_cart, seed_product, seed_store, setup_app};
use mbuy_checkout::auth::CUSTOMER_ID_HEADER;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn decimal_field(body: &Value, field: &str) -> Decimal {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("{field} missing"))
        .parse()
        .unwrap()
}

fn post_json(uri: &str, customer: Option<Uuid>, payload: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = customer {
        builder = builder.header(CUSTOMER_ID_HEADER, id.to_string());
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

#[tokio::test]
async fn health_endpoint_is_live() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn status_endpoint_reports_database_up() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn missing_customer_header_is_unauthorized() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(Request::get("/api/v1/orders").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbled_customer_header_is_unauthorized() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(
            Request::get("/api/v1/orders")
                .header(CUSTOMER_ID_HEADER, "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wallet_deposit_reports_new_balance() {
    let (app, _db) = setup_app().await;
    let customer = Uuid::new_v4();

    let response = app
        .oneshot(post_json(
            "/api/v1/wallet/deposit",
            Some(customer),
            json!({ "amount": "50.00" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(decimal_field(&body, "balance"), dec!(50.00));
}

#[tokio::test]
async fn negative_deposit_is_rejected() {
    let (app, _db) = setup_app().await;
    let customer = Uuid::new_v4();

    let response = app
        .oneshot(post_json(
            "/api/v1/wallet/deposit",
            Some(customer),
            json!({ "amount": "-5.00" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_with_empty_cart_returns_machine_code() {
    let (app, _db) = setup_app().await;
    let customer = Uuid::new_v4();

    let response = app
        .oneshot(post_json(
            "/api/v1/checkout",
            Some(customer),
            json!({
                "shipping_address": { "city": "Riyadh" },
                "payment_method": "cash",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "EMPTY_CART");
}

#[tokio::test]
async fn checkout_over_http_creates_orders() {
    let (app, db) = setup_app().await;
    let customer = Uuid::new_v4();

    let store = seed_store(&db, "A").await;
    let prod = seed_product(&db, store.id, "Lamp", dec!(100.00), 10).await;
    seed_cart(&db, customer, &[(prod.id, 2)]).await;

    let response = app
        .oneshot(post_json(
            "/api/v1/checkout",
            Some(customer),
            json!({
                "shipping_address": { "city": "Riyadh", "street": "King Fahd Rd" },
                "payment_method": "cash",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["payment_method"], "cash");
    assert_eq!(decimal_field(&body, "total_amount"), dec!(225.00));
}

#[tokio::test]
async fn order_listing_is_paginated() {
    let (app, db) = setup_app().await;
    let customer = Uuid::new_v4();

    let store = seed_store(&db, "A").await;
    let prod = seed_product(&db, store.id, "Lamp", dec!(10.00), 100).await;
    seed_cart(&db, customer, &[(prod.id, 1)]).await;

    let checkout = app
        .clone()
        .oneshot(post_json(
            "/api/v1/checkout",
            Some(customer),
            json!({
                "shipping_address": { "city": "Riyadh" },
                "payment_method": "cash",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(checkout.status(), StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::get("/api/v1/orders?page=1&per_page=10")
                .header(CUSTOMER_ID_HEADER, customer.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 1);
}
