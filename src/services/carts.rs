use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{cart, cart_item, product, store};
use crate::errors::ServiceError;

/// One cart line joined with whatever catalog rows still exist. Product or
/// store may have been deleted since the line was added, so both are
/// optional here; the validator decides what that means.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub product: Option<product::Model>,
    pub store: Option<store::Model>,
}

/// Snapshot of a customer's cart at a point in time.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub cart_id: Uuid,
    pub lines: Vec<CartLine>,
}

/// Loads cart contents and clears carts after successful checkout.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Loads the customer's cart with product and store rows joined in.
    ///
    /// Returns `EmptyCart` when the customer has no cart or the cart has no
    /// lines.
    #[instrument(skip(self))]
    pub async fn load_snapshot(&self, customer_id: Uuid) -> Result<CartSnapshot, ServiceError> {
        let cart = cart::Entity::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&*self.db)
            .await?;

        if items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let store_ids: Vec<Uuid> = products.values().map(|p| p.store_id).collect();
        let stores: HashMap<Uuid, store::Model> = store::Entity::find()
            .filter(store::Column::Id.is_in(store_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let lines = items
            .into_iter()
            .map(|item| {
                let product = products.get(&item.product_id).cloned();
                let store = product
                    .as_ref()
                    .and_then(|p| stores.get(&p.store_id).cloned());
                CartLine {
                    item_id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    product,
                    store,
                }
            })
            .collect();

        Ok(CartSnapshot {
            cart_id: cart.id,
            lines,
        })
    }

    /// Removes all lines from the cart. The cart row itself is kept so the
    /// customer keeps a stable cart id.
    #[instrument(skip(self))]
    pub async fn clear(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
