use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::product;
use crate::errors::ServiceError;

/// Stock movements on the products table. Decrements are conditional so two
/// checkouts racing for the last unit cannot both win.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Atomically takes `quantity` units off the product's stock.
    ///
    /// The UPDATE only matches while `stock >= quantity`, so exactly one of
    /// any set of concurrent callers can claim the final units. Zero rows
    /// affected means the stock is gone.
    #[instrument(skip(self))]
    pub async fn decrement(&self, product_id: Uuid, quantity: i32) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Decrement quantity must be positive".to_string(),
            ));
        }

        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(quantity))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            let name = product::Entity::find_by_id(product_id)
                .one(&*self.db)
                .await?
                .map(|p| p.name)
                .unwrap_or_else(|| product_id.to_string());
            return Err(ServiceError::InsufficientStock(name));
        }

        Ok(())
    }

    /// Returns `quantity` units to the product's stock. Used when a
    /// checkout is rolled back or an order is cancelled; tolerates the
    /// product having been deleted in the meantime.
    #[instrument(skip(self))]
    pub async fn restore(&self, product_id: Uuid, quantity: i32) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Restore quantity must be positive".to_string(),
            ));
        }

        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).add(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            info!(%product_id, "Skipping stock restore for deleted product");
        }

        Ok(())
    }
}
