use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::product::ProductStatus;
use crate::entities::store::StoreStatus;
use crate::services::carts::CartLine;

/// Why a cart line cannot be purchased right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    ProductNotFound,
    ProductUnavailable,
    StoreUnavailable,
    InsufficientStock,
}

/// A cart line that passed every check, with its price captured at
/// validation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidItem {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
    pub store_id: Uuid,
    pub store_name: String,
}

/// A cart line that failed a check, with enough detail for the client to
/// explain it to the customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub code: RejectionCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_stock: Option<i32>,
}

/// Outcome of classifying a cart snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartValidation {
    pub valid_items: Vec<ValidItem>,
    pub errors: Vec<ValidationIssue>,
}

impl CartValidation {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Classifies every cart line as purchasable or not. Pure function over the
/// loaded snapshot; stock figures reflect the load, not a reservation.
///
/// Checks run in order and the first failure wins: product exists, product
/// active, store active, stock covers quantity.
pub fn classify(lines: &[CartLine]) -> CartValidation {
    let mut valid_items = Vec::new();
    let mut errors = Vec::new();

    for line in lines {
        let product = match &line.product {
            Some(p) => p,
            None => {
                errors.push(ValidationIssue {
                    item_id: line.item_id,
                    product_name: None,
                    code: RejectionCode::ProductNotFound,
                    message: "Product no longer exists".to_string(),
                    available_stock: None,
                });
                continue;
            }
        };

        if product.status != ProductStatus::Active {
            errors.push(ValidationIssue {
                item_id: line.item_id,
                product_name: Some(product.name.clone()),
                code: RejectionCode::ProductUnavailable,
                message: format!("{} is not available", product.name),
                available_stock: None,
            });
            continue;
        }

        let store = match &line.store {
            Some(store) if store.status == StoreStatus::Active => store,
            _ => {
                errors.push(ValidationIssue {
                    item_id: line.item_id,
                    product_name: Some(product.name.clone()),
                    code: RejectionCode::StoreUnavailable,
                    message: format!("The store selling {} is not available", product.name),
                    available_stock: None,
                });
                continue;
            }
        };

        if product.stock < line.quantity {
            errors.push(ValidationIssue {
                item_id: line.item_id,
                product_name: Some(product.name.clone()),
                code: RejectionCode::InsufficientStock,
                message: format!(
                    "Only {} of {} left in stock",
                    product.stock, product.name
                ),
                available_stock: Some(product.stock),
            });
            continue;
        }

        let line_total = product.price * Decimal::from(line.quantity);
        valid_items.push(ValidItem {
            item_id: line.item_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            price: product.price,
            line_total,
            store_id: store.id,
            store_name: store.name.clone(),
        });
    }

    CartValidation {
        valid_items,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{product, store};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn test_store(status: StoreStatus) -> store::Model {
        store::Model {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Test Store".to_string(),
            status,
            created_at: Utc::now(),
        }
    }

    fn test_product(store_id: Uuid, stock: i32, status: ProductStatus) -> product::Model {
        product::Model {
            id: Uuid::new_v4(),
            store_id,
            name: "Widget".to_string(),
            price: dec!(50.00),
            stock,
            status,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(product: Option<product::Model>, store: Option<store::Model>, qty: i32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(),
            product_id: product.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            quantity: qty,
            product,
            store,
        }
    }

    #[test]
    fn healthy_line_is_valid() {
        let store = test_store(StoreStatus::Active);
        let product = test_product(store.id, 10, ProductStatus::Active);
        let result = classify(&[line(Some(product), Some(store), 3)]);

        assert!(result.is_clean());
        assert_eq!(result.valid_items.len(), 1);
        assert_eq!(result.valid_items[0].line_total, dec!(150.00));
    }

    #[test]
    fn missing_product_rejected() {
        let result = classify(&[line(None, None, 1)]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, RejectionCode::ProductNotFound);
    }

    #[test]
    fn inactive_product_rejected_before_store_check() {
        let store = test_store(StoreStatus::Inactive);
        let product = test_product(store.id, 10, ProductStatus::Inactive);
        let result = classify(&[line(Some(product), Some(store), 1)]);
        assert_eq!(result.errors[0].code, RejectionCode::ProductUnavailable);
    }

    #[test]
    fn inactive_store_rejected() {
        let store = test_store(StoreStatus::Inactive);
        let product = test_product(store.id, 10, ProductStatus::Active);
        let result = classify(&[line(Some(product), Some(store), 1)]);
        assert_eq!(result.errors[0].code, RejectionCode::StoreUnavailable);
    }

    #[test]
    fn short_stock_reports_available() {
        let store = test_store(StoreStatus::Active);
        let product = test_product(store.id, 2, ProductStatus::Active);
        let result = classify(&[line(Some(product), Some(store), 5)]);
        assert_eq!(result.errors[0].code, RejectionCode::InsufficientStock);
        assert_eq!(result.errors[0].available_stock, Some(2));
    }

    #[test]
    fn exact_stock_is_enough() {
        let store = test_store(StoreStatus::Active);
        let product = test_product(store.id, 5, ProductStatus::Active);
        let result = classify(&[line(Some(product), Some(store), 5)]);
        assert!(result.is_clean());
    }

    #[test]
    fn mixed_lines_split_correctly() {
        let store = test_store(StoreStatus::Active);
        let good = test_product(store.id, 10, ProductStatus::Active);
        let gone = test_product(store.id, 10, ProductStatus::Inactive);
        let result = classify(&[
            line(Some(good), Some(store.clone()), 1),
            line(Some(gone), Some(store), 1),
        ]);
        assert_eq!(result.valid_items.len(), 1);
        assert_eq!(result.errors.len(), 1);
    }
}
