#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use mbuy_checkout::config::AppConfig;
use mbuy_checkout::db::{establish_connection_with_config, run_migrations, DbConfig, DbPool};
use mbuy_checkout::entities::coupon::CouponDiscountType;
use mbuy_checkout::entities::product::ProductStatus;
use mbuy_checkout::entities::store::StoreStatus;
use mbuy_checkout::entities::{cart, cart_item, coupon, product, store};
use mbuy_checkout::events::{create_event_channel, Event};
use mbuy_checkout::{build_services, AppServices};

/// In-memory database plus wired services for integration tests.
///
/// The pool is pinned to a single connection: with sqlite::memory: every
/// pooled connection would otherwise get its own empty database.
pub struct TestCtx {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub events: mpsc::Receiver<Event>,
}

pub async fn setup() -> TestCtx {
    let db_config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(600),
        acquire_timeout: Duration::from_secs(5),
    };
    let pool = establish_connection_with_config(&db_config)
        .await
        .expect("connect to in-memory database");
    run_migrations(&pool).await.expect("run migrations");

    let db = Arc::new(pool);
    let (event_sender, events) = create_event_channel(64);
    let config = AppConfig::default();
    let services = build_services(db.clone(), &config, event_sender).expect("wire services");

    TestCtx {
        db,
        services,
        events,
    }
}

/// Full HTTP router over an in-memory database, for request-level tests.
/// The event receiver is dropped; sends are logged and discarded.
pub async fn setup_app() -> (axum::Router, Arc<DbPool>) {
    let db_config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(600),
        acquire_timeout: Duration::from_secs(5),
    };
    let pool = establish_connection_with_config(&db_config)
        .await
        .expect("connect to in-memory database");
    run_migrations(&pool).await.expect("run migrations");

    let db = Arc::new(pool);
    let (event_sender, _events) = create_event_channel(64);
    let config = AppConfig::default();
    let services =
        build_services(db.clone(), &config, event_sender.clone()).expect("wire services");

    let state = mbuy_checkout::AppState {
        db: db.clone(),
        config: Arc::new(config),
        event_sender,
        services,
    };

    (mbuy_checkout::app_router(state), db)
}

pub async fn seed_store(db: &DbPool, name: &str) -> store::Model {
    seed_store_with_status(db, name, StoreStatus::Active).await
}

pub async fn seed_store_with_status(
    db: &DbPool,
    name: &str,
    status: StoreStatus,
) -> store::Model {
    store::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        status: Set(status),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert store")
}

pub async fn seed_product(
    db: &DbPool,
    store_id: Uuid,
    name: &str,
    price: Decimal,
    stock: i32,
) -> product::Model {
    seed_product_with_status(db, store_id, name, price, stock, ProductStatus::Active).await
}

pub async fn seed_product_with_status(
    db: &DbPool,
    store_id: Uuid,
    name: &str,
    price: Decimal,
    stock: i32,
    status: ProductStatus,
) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        name: Set(name.to_string()),
        price: Set(price),
        stock: Set(stock),
        status: Set(status),
        image_url: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert product")
}

/// Creates a cart for the customer containing the given (product, quantity)
/// pairs.
pub async fn seed_cart(db: &DbPool, customer_id: Uuid, items: &[(Uuid, i32)]) -> cart::Model {
    let now = Utc::now();
    let created = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert cart");

    for (product_id, quantity) in items {
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(created.id),
            product_id: Set(*product_id),
            quantity: Set(*quantity),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("insert cart item");
    }

    created
}

pub async fn seed_coupon(
    db: &DbPool,
    code: &str,
    discount_type: CouponDiscountType,
    discount_value: Decimal,
    max_discount_amount: Option<Decimal>,
    expires_at: Option<DateTime<Utc>>,
) -> coupon::Model {
    coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        discount_type: Set(discount_type),
        discount_value: Set(discount_value),
        max_discount_amount: Set(max_discount_amount),
        expires_at: Set(expires_at),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert coupon")
}

/// Default checkout input: cash on delivery, no discounts.
pub fn cash_checkout() -> mbuy_checkout::services::checkout::CheckoutInput {
    mbuy_checkout::services::checkout::CheckoutInput {
        shipping_address: serde_json::json!({
            "city": "Riyadh",
            "street": "King Fahd Rd",
        }),
        payment_method: mbuy_checkout::entities::order::PaymentMethod::Cash,
        notes: None,
        coupon_code: None,
        use_points: 0,
    }
}
