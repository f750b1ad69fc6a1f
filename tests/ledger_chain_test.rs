mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::setup;
use mbuy_checkout::entities::wallet::WalletOwnerType;
use mbuy_checkout::entities::wallet_transaction::{self, WalletTransactionKind};
use mbuy_checkout::errors::ServiceError;

#[tokio::test]
async fn balance_after_chains_through_movements() {
    let ctx = setup().await;
    let owner = Uuid::new_v4();
    let ledger = &ctx.services.ledger;

    let first = ledger
        .credit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(100.00),
            WalletTransactionKind::Deposit,
            "wallet_deposit",
        )
        .await
        .unwrap();
    assert_eq!(first.amount, dec!(100.00));
    assert_eq!(first.balance_after, dec!(100.00));

    let second = ledger
        .debit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(30.00),
            WalletTransactionKind::Withdraw,
            "checkout",
        )
        .await
        .unwrap();
    // debits are recorded as negative amounts
    assert_eq!(second.amount, dec!(-30.00));
    assert_eq!(second.balance_after, dec!(70.00));

    let third = ledger
        .credit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(10.00),
            WalletTransactionKind::Refund,
            "order_cancel:ORD-TEST",
        )
        .await
        .unwrap();
    assert_eq!(third.balance_after, dec!(80.00));

    let balance = ledger
        .wallet_balance(owner, WalletOwnerType::Customer)
        .await
        .unwrap();
    assert_eq!(balance, dec!(80.00));

    // the sum of signed amounts reproduces the balance
    let rows = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::WalletId.eq(first.wallet_id))
        .all(&*ctx.db)
        .await
        .unwrap();
    let summed: Decimal = rows.iter().map(|r| r.amount).sum();
    assert_eq!(summed, balance);
}

#[tokio::test]
async fn concurrent_debits_never_go_negative() {
    let ctx = setup().await;
    let owner = Uuid::new_v4();
    let ledger = ctx.services.ledger.clone();

    ledger
        .credit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(100.00),
            WalletTransactionKind::Deposit,
            "wallet_deposit",
        )
        .await
        .unwrap();

    let a = ledger.clone();
    let b = ledger.clone();
    let (first, second) = tokio::join!(
        a.debit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(60.00),
            WalletTransactionKind::Withdraw,
            "checkout",
        ),
        b.debit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(60.00),
            WalletTransactionKind::Withdraw,
            "checkout",
        ),
    );

    let wins = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|w| **w)
        .count();
    assert_eq!(wins, 1, "only one debit may drain below the second");

    let balance = ledger
        .wallet_balance(owner, WalletOwnerType::Customer)
        .await
        .unwrap();
    assert_eq!(balance, dec!(40.00));
}

#[tokio::test]
async fn debit_beyond_balance_is_refused() {
    let ctx = setup().await;
    let owner = Uuid::new_v4();
    let ledger = &ctx.services.ledger;

    ledger
        .credit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(20.00),
            WalletTransactionKind::Deposit,
            "wallet_deposit",
        )
        .await
        .unwrap();

    let err = ledger
        .debit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(25.00),
            WalletTransactionKind::Withdraw,
            "checkout",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientWalletBalance(_)));

    // a missing wallet reads the same as an empty one
    let err = ledger
        .debit_wallet(
            Uuid::new_v4(),
            WalletOwnerType::Customer,
            dec!(1.00),
            WalletTransactionKind::Withdraw,
            "checkout",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientWalletBalance(_)));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let ctx = setup().await;
    let owner = Uuid::new_v4();
    let ledger = &ctx.services.ledger;

    for amount in [Decimal::ZERO, dec!(-5.00)] {
        let err = ledger
            .credit_wallet(
                owner,
                WalletOwnerType::Customer,
                amount,
                WalletTransactionKind::Deposit,
                "wallet_deposit",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err = ledger
            .debit_wallet(
                owner,
                WalletOwnerType::Customer,
                amount,
                WalletTransactionKind::Withdraw,
                "checkout",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    assert!(ledger.earn_points(owner, 0, "bonus").await.is_err());
    assert!(ledger.spend_points(owner, -3, "spend").await.is_err());
}

#[tokio::test]
async fn points_chain_and_capped_spend() {
    let ctx = setup().await;
    let user = Uuid::new_v4();
    let ledger = &ctx.services.ledger;

    let earned = ledger.earn_points(user, 50, "signup_bonus").await.unwrap();
    assert_eq!(earned.points, 50);
    assert_eq!(earned.balance_after, 50);

    let spent = ledger.spend_points(user, 20, "order_discount").await.unwrap();
    assert_eq!(spent.points, -20);
    assert_eq!(spent.balance_after, 30);

    let err = ledger
        .spend_points(user, 40, "order_discount")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    assert_eq!(ledger.points_balance(user).await.unwrap(), 30);
}

#[tokio::test]
async fn separate_owner_types_have_separate_wallets() {
    let ctx = setup().await;
    let owner = Uuid::new_v4();
    let ledger = &ctx.services.ledger;

    ledger
        .credit_wallet(
            owner,
            WalletOwnerType::Customer,
            dec!(10.00),
            WalletTransactionKind::Deposit,
            "wallet_deposit",
        )
        .await
        .unwrap();
    ledger
        .credit_wallet(
            owner,
            WalletOwnerType::Merchant,
            dec!(99.00),
            WalletTransactionKind::Deposit,
            "payout",
        )
        .await
        .unwrap();

    let customer = ledger
        .wallet_balance(owner, WalletOwnerType::Customer)
        .await
        .unwrap();
    let merchant = ledger
        .wallet_balance(owner, WalletOwnerType::Merchant)
        .await
        .unwrap();
    assert_eq!(customer, dec!(10.00));
    assert_eq!(merchant, dec!(99.00));
}
