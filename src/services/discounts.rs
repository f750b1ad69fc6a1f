use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::coupon::{self, CouponDiscountType};
use crate::entities::points_account;
use crate::errors::ServiceError;

/// Resolved discounts for one checkout, before allocation across stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    /// Points the customer asked to redeem.
    pub points_requested: i64,
    /// Points actually redeemed, capped at the account balance.
    pub points_redeemed: i64,
    /// Monetary value of the redeemed points.
    pub points_value: Decimal,
    /// Coupon code that was applied, if any.
    pub coupon_code: Option<String>,
    /// Monetary value of the coupon.
    pub coupon_discount: Decimal,
}

impl DiscountBreakdown {
    pub fn none() -> Self {
        Self {
            points_requested: 0,
            points_redeemed: 0,
            points_value: Decimal::ZERO,
            coupon_code: None,
            coupon_discount: Decimal::ZERO,
        }
    }

    pub fn total(&self) -> Decimal {
        self.points_value + self.coupon_discount
    }
}

/// Resolves coupon and points discounts against the database.
#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DbPool>,
    /// Monetary value of one loyalty point.
    point_value: Decimal,
}

impl DiscountService {
    pub fn new(db: Arc<DbPool>, point_value: Decimal) -> Self {
        Self { db, point_value }
    }

    /// Resolves the requested coupon and points redemption for a checkout
    /// totalling `cart_total`.
    ///
    /// Points are capped at the account balance; an unusable coupon
    /// (unknown, inactive, or expired) is silently ignored rather than
    /// failing the checkout.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        customer_id: Uuid,
        coupon_code: Option<&str>,
        points_requested: i64,
        cart_total: Decimal,
    ) -> Result<DiscountBreakdown, ServiceError> {
        let mut breakdown = DiscountBreakdown::none();
        breakdown.points_requested = points_requested.max(0);

        if breakdown.points_requested > 0 {
            let balance = points_account::Entity::find()
                .filter(points_account::Column::UserId.eq(customer_id))
                .one(&*self.db)
                .await?
                .map(|a| a.balance)
                .unwrap_or(0);

            breakdown.points_redeemed = breakdown.points_requested.min(balance.max(0));
            breakdown.points_value =
                Decimal::from(breakdown.points_redeemed) * self.point_value;
        }

        if let Some(code) = coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            let found = coupon::Entity::find()
                .filter(coupon::Column::Code.eq(code))
                .one(&*self.db)
                .await?;

            match found {
                Some(c) => {
                    let discount = coupon_value(&c, cart_total, Utc::now());
                    if discount > Decimal::ZERO {
                        breakdown.coupon_code = Some(c.code);
                        breakdown.coupon_discount = discount;
                    } else {
                        debug!(code, "Coupon not applicable, ignoring");
                    }
                }
                None => debug!(code, "Unknown coupon code, ignoring"),
            }
        }

        Ok(breakdown)
    }
}

/// Computes what a coupon is worth against `cart_total` at time `now`.
/// Returns zero for inactive or expired coupons.
pub fn coupon_value(c: &coupon::Model, cart_total: Decimal, now: DateTime<Utc>) -> Decimal {
    if !c.is_active {
        return Decimal::ZERO;
    }
    if matches!(c.expires_at, Some(expiry) if expiry < now) {
        return Decimal::ZERO;
    }

    let raw = match c.discount_type {
        CouponDiscountType::Percent => {
            cart_total * c.discount_value / Decimal::from(100)
        }
        CouponDiscountType::Fixed => c.discount_value,
    };

    let capped = match c.max_discount_amount {
        Some(cap) => raw.min(cap),
        None => raw,
    };

    capped.min(cart_total).max(Decimal::ZERO)
}

/// Splits a checkout-level discount across store subtotals, proportional to
/// each store's share.
///
/// All shares but the last are truncated to cents; the last store absorbs
/// the rounding remainder so the parts always sum to the whole. Each share
/// is clamped to its subtotal, and the total is clamped to the grand
/// subtotal up front, so no order ever goes negative.
pub fn allocate(discount_total: Decimal, subtotals: &[Decimal]) -> Vec<Decimal> {
    if subtotals.is_empty() {
        return Vec::new();
    }

    let grand: Decimal = subtotals.iter().sum();
    if grand <= Decimal::ZERO || discount_total <= Decimal::ZERO {
        return vec![Decimal::ZERO; subtotals.len()];
    }

    let total = discount_total.min(grand);
    let mut shares = Vec::with_capacity(subtotals.len());
    let mut allocated = Decimal::ZERO;

    for (i, subtotal) in subtotals.iter().enumerate() {
        let share = if i + 1 == subtotals.len() {
            (total - allocated).min(*subtotal)
        } else {
            (total * subtotal / grand).trunc_with_scale(2)
        };
        allocated += share;
        shares.push(share);
    }

    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn percent_coupon(value: Decimal, cap: Option<Decimal>) -> coupon::Model {
        coupon::Model {
            id: Uuid::new_v4(),
            code: "SAVE".to_string(),
            discount_type: CouponDiscountType::Percent,
            discount_value: value,
            max_discount_amount: cap,
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percent_coupon_capped() {
        let c = percent_coupon(dec!(10), Some(dec!(5.00)));
        assert_eq!(coupon_value(&c, dec!(100.00), Utc::now()), dec!(5.00));
    }

    #[test]
    fn percent_coupon_uncapped() {
        let c = percent_coupon(dec!(10), None);
        assert_eq!(coupon_value(&c, dec!(250.00), Utc::now()), dec!(25.00));
    }

    #[test]
    fn fixed_coupon_never_exceeds_cart() {
        let c = coupon::Model {
            discount_type: CouponDiscountType::Fixed,
            discount_value: dec!(80.00),
            ..percent_coupon(dec!(0), None)
        };
        assert_eq!(coupon_value(&c, dec!(50.00), Utc::now()), dec!(50.00));
    }

    #[test]
    fn expired_coupon_is_worthless() {
        let mut c = percent_coupon(dec!(10), None);
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        assert_eq!(coupon_value(&c, dec!(100.00), Utc::now()), Decimal::ZERO);
    }

    #[test]
    fn inactive_coupon_is_worthless() {
        let mut c = percent_coupon(dec!(10), None);
        c.is_active = false;
        assert_eq!(coupon_value(&c, dec!(100.00), Utc::now()), Decimal::ZERO);
    }

    #[test]
    fn future_expiry_still_valid() {
        let mut c = percent_coupon(dec!(10), None);
        c.expires_at = Some(Utc::now() + Duration::hours(1));
        assert_eq!(coupon_value(&c, dec!(100.00), Utc::now()), dec!(10.00));
    }

    #[test]
    fn allocation_sums_to_total() {
        let shares = allocate(dec!(10.00), &[dec!(45.00), dec!(55.00)]);
        assert_eq!(shares, vec![dec!(4.50), dec!(5.50)]);
    }

    #[test]
    fn last_store_absorbs_rounding() {
        let shares = allocate(dec!(10.00), &[dec!(33.33), dec!(33.33), dec!(33.34)]);
        let sum: Decimal = shares.iter().sum();
        assert_eq!(sum, dec!(10.00));
        // first two truncated down, remainder lands on the last
        assert!(shares[2] >= shares[0]);
    }

    #[test]
    fn discount_clamped_to_grand_subtotal() {
        let shares = allocate(dec!(500.00), &[dec!(30.00), dec!(20.00)]);
        let sum: Decimal = shares.iter().sum();
        assert_eq!(sum, dec!(50.00));
        assert!(shares[0] <= dec!(30.00));
        assert!(shares[1] <= dec!(20.00));
    }

    #[test]
    fn zero_discount_allocates_zeroes() {
        assert_eq!(
            allocate(Decimal::ZERO, &[dec!(10.00), dec!(20.00)]),
            vec![Decimal::ZERO, Decimal::ZERO]
        );
    }

    #[test]
    fn single_store_takes_it_all() {
        assert_eq!(allocate(dec!(7.77), &[dec!(100.00)]), vec![dec!(7.77)]);
    }

    #[test]
    fn breakdown_total_adds_both_sources() {
        let b = DiscountBreakdown {
            points_requested: 50,
            points_redeemed: 50,
            points_value: dec!(5.00),
            coupon_code: Some("SAVE".to_string()),
            coupon_discount: dec!(10.00),
        };
        assert_eq!(b.total(), dec!(15.00));
    }
}
