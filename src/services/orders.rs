use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::order::{self, OrderStatus, PaymentMethod, PaymentStatus};
use crate::entities::order_item;
use crate::entities::wallet::WalletOwnerType;
use crate::entities::wallet_transaction::WalletTransactionKind;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::inventory::InventoryService;
use crate::services::ledger::LedgerService;

/// Order header waiting to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub store_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub coupon_code: Option<String>,
}

/// Line item snapshot for a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total: Decimal,
}

/// Generates a human-readable order number, e.g. `ORD-LX3K9A2F-7Q4D`.
/// Millisecond timestamp in base 36 plus four random characters; unique
/// enough for the unique index to almost never complain.
pub fn generate_order_number() -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    let mut ts = Utc::now().timestamp_millis().max(0) as u64;
    let mut encoded = Vec::new();
    while ts > 0 {
        encoded.push(ALPHABET[(ts % 36) as usize]);
        ts /= 36;
    }
    encoded.reverse();
    let base36 = String::from_utf8_lossy(&encoded).to_string();

    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    format!("ORD-{}-{}", base36, suffix)
}

/// Persists, cancels, and reads orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    inventory: InventoryService,
    ledger: LedgerService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        inventory: InventoryService,
        ledger: LedgerService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            inventory,
            ledger,
            event_sender,
        }
    }

    /// Inserts the order header and its items. If the items fail to insert,
    /// the header is deleted again so no empty order is left behind.
    #[instrument(skip(self, new_order, items))]
    pub async fn persist_order(
        &self,
        new_order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let header = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            customer_id: Set(new_order.customer_id),
            store_id: Set(new_order.store_id),
            status: Set(OrderStatus::Pending),
            payment_method: Set(new_order.payment_method),
            payment_status: Set(new_order.payment_status),
            payment_reference: Set(new_order.payment_reference),
            subtotal: Set(new_order.subtotal),
            discount_amount: Set(new_order.discount_amount),
            shipping_amount: Set(new_order.shipping_amount),
            total_amount: Set(new_order.total_amount),
            shipping_address: Set(new_order.shipping_address),
            notes: Set(new_order.notes),
            coupon_code: Set(new_order.coupon_code),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        let item_models: Vec<order_item::ActiveModel> = items
            .into_iter()
            .map(|item| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name),
                quantity: Set(item.quantity),
                price: Set(item.price),
                total: Set(item.total),
                created_at: Set(now),
            })
            .collect();

        if let Err(e) = order_item::Entity::insert_many(item_models)
            .exec(&*self.db)
            .await
        {
            error!(%order_id, "Order item insert failed, deleting header: {}", e);
            if let Err(del) = order::Entity::delete_by_id(order_id).exec(&*self.db).await {
                error!(%order_id, "Failed to delete orphaned order header: {}", del);
            }
            return Err(e.into());
        }

        let stored_items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;

        Ok((header, stored_items))
    }

    /// Deletes an order and its items. Compensation path only; customer
    /// cancellation goes through `cancel_order`.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&*self.db)
            .await?;
        order::Entity::delete_by_id(order_id).exec(&*self.db).await?;
        Ok(())
    }

    /// Cancels a pending order: flips the status, restores stock, and
    /// refunds a settled wallet payment.
    ///
    /// The status flip is conditional on `status = 'pending'`, which also
    /// makes the call idempotent: a second cancel (or a cancel racing a
    /// fulfillment transition) sees zero rows affected and fails with
    /// `CannotCancel` before any stock or money moves.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let found = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let now = Utc::now();
        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Cancelled))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::CannotCancel);
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        for item in &items {
            if let Err(e) = self.inventory.restore(item.product_id, item.quantity).await {
                warn!(
                    order_id = %order_id,
                    product_id = %item.product_id,
                    "Stock restore failed during cancel: {}",
                    e
                );
            }
        }

        if found.payment_method == PaymentMethod::Wallet
            && found.payment_status == PaymentStatus::Paid
        {
            self.ledger
                .credit_wallet(
                    customer_id,
                    WalletOwnerType::Customer,
                    found.total_amount,
                    WalletTransactionKind::Refund,
                    &format!("order_cancel:{}", found.order_number),
                )
                .await?;
        }

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    /// Lists the customer's orders, newest first, optionally filtered by
    /// status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Uuid,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id));
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((orders, total))
    }

    /// Fetches one of the customer's orders with its items.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let found = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok((found, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_have_expected_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 4);
        assert!(parts[1]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn order_numbers_are_distinct() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert_ne!(a, b);
    }
}
