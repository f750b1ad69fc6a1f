use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::validation::ValidItem;

/// All valid items belonging to one store, the unit an order is created for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreGroup {
    pub store_id: Uuid,
    pub store_name: String,
    pub items: Vec<ValidItem>,
    pub subtotal: Decimal,
}

/// Groups valid items by store, preserving the order stores first appear in
/// the cart.
///
/// Returns `NoValidItems` when there is nothing left to group; a checkout
/// with zero orders must never be created.
pub fn by_store(items: Vec<ValidItem>) -> Result<Vec<StoreGroup>, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::NoValidItems);
    }

    let mut groups: Vec<StoreGroup> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|g| g.store_id == item.store_id) {
            Some(group) => {
                group.subtotal += item.line_total;
                group.items.push(item);
            }
            None => {
                groups.push(StoreGroup {
                    store_id: item.store_id,
                    store_name: item.store_name.clone(),
                    subtotal: item.line_total,
                    items: vec![item],
                });
            }
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(store_id: Uuid, store_name: &str, total: Decimal) -> ValidItem {
        ValidItem {
            item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Widget".to_string(),
            quantity: 1,
            price: total,
            line_total: total,
            store_id,
            store_name: store_name.to_string(),
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            by_store(vec![]),
            Err(ServiceError::NoValidItems)
        ));
    }

    #[test]
    fn groups_by_store_with_subtotals() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let groups = by_store(vec![
            item(a, "A", dec!(10.00)),
            item(b, "B", dec!(20.00)),
            item(a, "A", dec!(5.00)),
        ])
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].store_id, a);
        assert_eq!(groups[0].subtotal, dec!(15.00));
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[1].store_id, b);
        assert_eq!(groups[1].subtotal, dec!(20.00));
    }

    #[test]
    fn first_seen_order_is_kept() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let groups = by_store(vec![
            item(c, "C", dec!(1.00)),
            item(a, "A", dec!(1.00)),
            item(b, "B", dec!(1.00)),
            item(c, "C", dec!(1.00)),
        ])
        .unwrap();

        let order: Vec<Uuid> = groups.iter().map(|g| g.store_id).collect();
        assert_eq!(order, vec![c, a, b]);
    }
}
