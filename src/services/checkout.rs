use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::entities::order::{self, PaymentMethod};
use crate::entities::wallet::WalletOwnerType;
use crate::entities::wallet_transaction::WalletTransactionKind;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::carts::CartService;
use crate::services::discounts::{self, DiscountBreakdown, DiscountService};
use crate::services::inventory::InventoryService;
use crate::services::ledger::LedgerService;
use crate::services::notifications::NotificationService;
use crate::services::orders::{NewOrder, NewOrderItem, OrderService};
use crate::services::partition::{self, StoreGroup};
use crate::services::payments::PaymentResolver;
use crate::services::validation::{self, CartValidation, RejectionCode};

/// What the customer asked for at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub shipping_address: serde_json::Value,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub coupon_code: Option<String>,
    pub use_points: i64,
}

/// Totals shown alongside a validation preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSummary {
    pub subtotal: Decimal,
    pub items_count: usize,
    pub currency: String,
}

/// Read-only dry run of a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutPreview {
    pub is_valid: bool,
    #[serde(flatten)]
    pub validation: CartValidation,
    pub summary: PreviewSummary,
}

/// Result of a committed checkout.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub orders: Vec<order::Model>,
    pub discounts: DiscountBreakdown,
    pub grand_total: Decimal,
    pub reward_points: i64,
}

/// Undo actions collected while a checkout progresses. On failure they run
/// in reverse order, returning the system to its pre-checkout state.
enum Compensation {
    RestoreStock { product_id: Uuid, quantity: i32 },
    RefundPoints { customer_id: Uuid, points: i64 },
    RefundWallet { customer_id: Uuid, amount: Decimal },
    DeleteOrder { order_id: Uuid },
}

/// Orchestrates the checkout pipeline: validate, split per store, price,
/// settle, persist, notify.
///
/// There is no cross-table transaction here; each step commits on its own
/// and failures unwind through the compensation stack instead.
#[derive(Clone)]
pub struct CheckoutService {
    carts: CartService,
    discounts: DiscountService,
    payments: PaymentResolver,
    ledger: LedgerService,
    inventory: InventoryService,
    orders: OrderService,
    notifications: NotificationService,
    event_sender: EventSender,
    /// Flat shipping fee charged once per store order.
    shipping_fee: Decimal,
    /// Reward points earned per unit of currency spent.
    reward_rate: Decimal,
    /// Currency code reported in previews; all amounts share it.
    currency: String,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carts: CartService,
        discounts: DiscountService,
        payments: PaymentResolver,
        ledger: LedgerService,
        inventory: InventoryService,
        orders: OrderService,
        notifications: NotificationService,
        event_sender: EventSender,
        shipping_fee: Decimal,
        reward_rate: Decimal,
        currency: String,
    ) -> Self {
        Self {
            carts,
            discounts,
            payments,
            ledger,
            inventory,
            orders,
            notifications,
            event_sender,
            shipping_fee,
            reward_rate,
            currency,
        }
    }

    /// Validates the cart without touching any state. The stock figures are
    /// a snapshot; checkout re-checks them at commit time.
    #[instrument(skip(self))]
    pub async fn validate(&self, customer_id: Uuid) -> Result<CheckoutPreview, ServiceError> {
        let snapshot = self.carts.load_snapshot(customer_id).await?;
        let validation = validation::classify(&snapshot.lines);
        let subtotal = validation
            .valid_items
            .iter()
            .map(|i| i.line_total)
            .sum();

        Ok(CheckoutPreview {
            is_valid: validation.is_clean(),
            summary: PreviewSummary {
                subtotal,
                items_count: validation.valid_items.len(),
                currency: self.currency.clone(),
            },
            validation,
        })
    }

    /// Runs the full checkout.
    ///
    /// Unavailable lines (product or store gone) are silently dropped, but
    /// a line short on stock aborts the whole checkout: the customer should
    /// adjust the quantity rather than receive a surprise partial order.
    #[instrument(skip(self, input))]
    pub async fn checkout(
        &self,
        customer_id: Uuid,
        input: CheckoutInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let snapshot = self.carts.load_snapshot(customer_id).await?;
        let validation = validation::classify(&snapshot.lines);

        if let Some(short) = validation
            .errors
            .iter()
            .find(|e| e.code == RejectionCode::InsufficientStock)
        {
            let name = short
                .product_name
                .clone()
                .unwrap_or_else(|| "item".to_string());
            return Err(ServiceError::InsufficientStock(name));
        }

        let groups = partition::by_store(validation.valid_items)?;
        let grand_subtotal: Decimal = groups.iter().map(|g| g.subtotal).sum();

        let breakdown = self
            .discounts
            .resolve(
                customer_id,
                input.coupon_code.as_deref(),
                input.use_points,
                grand_subtotal,
            )
            .await?;

        let subtotals: Vec<Decimal> = groups.iter().map(|g| g.subtotal).collect();
        let allocations = discounts::allocate(breakdown.total(), &subtotals);
        let grand_total: Decimal = groups
            .iter()
            .zip(&allocations)
            .map(|(g, d)| g.subtotal - *d + self.shipping_fee)
            .sum();

        let shipping_address = input.shipping_address.to_string();
        let mut compensations: Vec<Compensation> = Vec::new();

        let result = self
            .commit(
                customer_id,
                &input,
                &groups,
                &allocations,
                &breakdown,
                grand_total,
                &shipping_address,
                &mut compensations,
            )
            .await;

        let orders = match result {
            Ok(orders) => orders,
            Err(e) => {
                self.unwind(compensations).await;
                return Err(e);
            }
        };

        // Point of no return: orders exist and payment is settled. Reward
        // crediting and cart clearing are best-effort from here on.
        let reward_points = self.credit_rewards(customer_id, &groups).await;

        if let Err(e) = self.carts.clear(snapshot.cart_id).await {
            warn!(%customer_id, "Failed to clear cart after checkout: {}", e);
        }

        let notifications = self.notifications.clone();
        let created = orders.clone();
        tokio::spawn(async move {
            notifications
                .dispatch_order_created(customer_id, &created)
                .await;
        });

        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                customer_id,
                order_ids: orders.iter().map(|o| o.id).collect(),
                total: grand_total,
            })
            .await;

        info!(
            %customer_id,
            orders = orders.len(),
            %grand_total,
            "Checkout committed"
        );

        Ok(CheckoutOutcome {
            orders,
            discounts: breakdown,
            grand_total,
            reward_points,
        })
    }

    /// The state-changing middle of the checkout. Every successful step
    /// pushes its undo action before the next one runs.
    #[allow(clippy::too_many_arguments)]
    async fn commit(
        &self,
        customer_id: Uuid,
        input: &CheckoutInput,
        groups: &[StoreGroup],
        allocations: &[Decimal],
        breakdown: &DiscountBreakdown,
        grand_total: Decimal,
        shipping_address: &str,
        compensations: &mut Vec<Compensation>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        // Claim stock first; this is the step most likely to lose a race.
        for group in groups {
            for item in &group.items {
                self.inventory.decrement(item.product_id, item.quantity).await?;
                compensations.push(Compensation::RestoreStock {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
        }

        if breakdown.points_redeemed > 0 {
            self.ledger
                .spend_points(customer_id, breakdown.points_redeemed, "order_discount")
                .await?;
            compensations.push(Compensation::RefundPoints {
                customer_id,
                points: breakdown.points_redeemed,
            });
        }

        if input.payment_method == PaymentMethod::Wallet {
            self.ledger
                .debit_wallet(
                    customer_id,
                    WalletOwnerType::Customer,
                    grand_total,
                    WalletTransactionKind::Withdraw,
                    "checkout",
                )
                .await?;
            compensations.push(Compensation::RefundWallet {
                customer_id,
                amount: grand_total,
            });
        }

        let outcome = self
            .payments
            .resolve(input.payment_method, grand_total, customer_id)
            .await?;

        let mut orders = Vec::with_capacity(groups.len());
        for (group, discount) in groups.iter().zip(allocations) {
            let total_amount = group.subtotal - *discount + self.shipping_fee;
            let new_order = NewOrder {
                customer_id,
                store_id: group.store_id,
                payment_method: input.payment_method,
                payment_status: outcome.status,
                payment_reference: outcome.reference.clone(),
                subtotal: group.subtotal,
                discount_amount: *discount,
                shipping_amount: self.shipping_fee,
                total_amount,
                shipping_address: shipping_address.to_string(),
                notes: input.notes.clone(),
                coupon_code: breakdown.coupon_code.clone(),
            };
            let items = group
                .items
                .iter()
                .map(|i| NewOrderItem {
                    product_id: i.product_id,
                    product_name: i.product_name.clone(),
                    quantity: i.quantity,
                    price: i.price,
                    total: i.line_total,
                })
                .collect();

            let (stored, _items) = self.orders.persist_order(new_order, items).await?;
            compensations.push(Compensation::DeleteOrder {
                order_id: stored.id,
            });
            orders.push(stored);
        }

        Ok(orders)
    }

    /// Runs the collected undo actions in reverse. Failures are logged and
    /// the unwind keeps going; a partial rollback is still better than
    /// stopping at the first error.
    async fn unwind(&self, compensations: Vec<Compensation>) {
        for compensation in compensations.into_iter().rev() {
            match compensation {
                Compensation::RestoreStock {
                    product_id,
                    quantity,
                } => {
                    if let Err(e) = self.inventory.restore(product_id, quantity).await {
                        error!(%product_id, "Compensation failed to restore stock: {}", e);
                    }
                }
                Compensation::RefundPoints {
                    customer_id,
                    points,
                } => {
                    if let Err(e) = self
                        .ledger
                        .earn_points(customer_id, points, "checkout_rollback")
                        .await
                    {
                        error!(%customer_id, "Compensation failed to refund points: {}", e);
                    }
                }
                Compensation::RefundWallet {
                    customer_id,
                    amount,
                } => {
                    if let Err(e) = self
                        .ledger
                        .credit_wallet(
                            customer_id,
                            WalletOwnerType::Customer,
                            amount,
                            WalletTransactionKind::Refund,
                            "checkout_rollback",
                        )
                        .await
                    {
                        error!(%customer_id, "Compensation failed to refund wallet: {}", e);
                    }
                }
                Compensation::DeleteOrder { order_id } => {
                    if let Err(e) = self.orders.delete_order(order_id).await {
                        error!(%order_id, "Compensation failed to delete order: {}", e);
                    }
                }
            }
        }
    }

    /// Credits purchase reward points, floored per store order so each
    /// order awards exactly its own share. Never fails the checkout: the
    /// orders are already committed, so a ledger hiccup here only costs a
    /// retry by support, not the sale.
    async fn credit_rewards(&self, customer_id: Uuid, groups: &[StoreGroup]) -> i64 {
        let points: i64 = groups
            .iter()
            .map(|g| (g.subtotal * self.reward_rate).floor().to_i64().unwrap_or(0))
            .sum();
        if points <= 0 {
            return 0;
        }

        match self
            .ledger
            .earn_points(customer_id, points, "purchase_reward")
            .await
        {
            Ok(_) => points,
            Err(e) => {
                error!(%customer_id, points, "Failed to credit reward points: {}", e);
                0
            }
        }
    }
}
