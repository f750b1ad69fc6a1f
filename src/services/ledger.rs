use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::points_account;
use crate::entities::points_transaction::{self, PointsTransactionKind};
use crate::entities::wallet::{self, WalletOwnerType};
use crate::entities::wallet_transaction::{self, WalletTransactionKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Wallet and points ledgers. Every balance change pairs a balance update
/// with an append-only transaction row carrying `balance_after`, so the
/// transaction history always chains to the current balance.
///
/// Writes to one account are serialized through an in-process per-account
/// mutex; the conditional UPDATE underneath is the backstop against lost
/// updates from other processes.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    wallet_locks: Arc<DashMap<(Uuid, WalletOwnerType), Arc<Mutex<()>>>>,
    points_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LedgerService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db,
            event_sender,
            wallet_locks: Arc::new(DashMap::new()),
            points_locks: Arc::new(DashMap::new()),
        }
    }

    fn wallet_lock(&self, owner_id: Uuid, owner_type: WalletOwnerType) -> Arc<Mutex<()>> {
        self.wallet_locks
            .entry((owner_id, owner_type))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn points_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.points_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn find_or_create_wallet(
        &self,
        owner_id: Uuid,
        owner_type: WalletOwnerType,
    ) -> Result<wallet::Model, ServiceError> {
        let existing = wallet::Entity::find()
            .filter(wallet::Column::OwnerId.eq(owner_id))
            .filter(wallet::Column::OwnerType.eq(owner_type))
            .one(&*self.db)
            .await?;

        if let Some(found) = existing {
            return Ok(found);
        }

        let now = Utc::now();
        let created = wallet::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            owner_type: Set(owner_type),
            balance: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        Ok(created)
    }

    /// Credits a wallet, creating it on first use.
    #[instrument(skip(self))]
    pub async fn credit_wallet(
        &self,
        owner_id: Uuid,
        owner_type: WalletOwnerType,
        amount: Decimal,
        kind: WalletTransactionKind,
        source: &str,
    ) -> Result<wallet_transaction::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Credit amount must be positive".to_string(),
            ));
        }

        let lock = self.wallet_lock(owner_id, owner_type);
        let _guard = lock.lock().await;

        let found = self.find_or_create_wallet(owner_id, owner_type).await?;
        let balance_after = found.balance + amount;
        let now = Utc::now();

        let result = wallet::Entity::update_many()
            .col_expr(
                wallet::Column::Balance,
                Expr::col(wallet::Column::Balance).add(amount),
            )
            .col_expr(wallet::Column::UpdatedAt, Expr::value(now))
            .filter(wallet::Column::Id.eq(found.id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Wallet disappeared during credit".to_string(),
            ));
        }

        let tx = wallet_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(found.id),
            amount: Set(amount),
            kind: Set(kind),
            source: Set(source.to_string()),
            balance_after: Set(balance_after),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::WalletCredited {
                wallet_id: found.id,
                amount,
            })
            .await;

        Ok(tx)
    }

    /// Debits a wallet. Fails with `InsufficientWalletBalance` when the
    /// balance does not cover the amount, and with `Conflict` when a
    /// concurrent writer got there first.
    #[instrument(skip(self))]
    pub async fn debit_wallet(
        &self,
        owner_id: Uuid,
        owner_type: WalletOwnerType,
        amount: Decimal,
        kind: WalletTransactionKind,
        source: &str,
    ) -> Result<wallet_transaction::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Debit amount must be positive".to_string(),
            ));
        }

        let lock = self.wallet_lock(owner_id, owner_type);
        let _guard = lock.lock().await;

        let found = wallet::Entity::find()
            .filter(wallet::Column::OwnerId.eq(owner_id))
            .filter(wallet::Column::OwnerType.eq(owner_type))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InsufficientWalletBalance("Wallet has no funds".to_string())
            })?;

        if found.balance < amount {
            return Err(ServiceError::InsufficientWalletBalance(format!(
                "Balance {} does not cover {}",
                found.balance, amount
            )));
        }

        let balance_after = found.balance - amount;
        let now = Utc::now();

        // Guard against writers outside this process.
        let result = wallet::Entity::update_many()
            .col_expr(
                wallet::Column::Balance,
                Expr::col(wallet::Column::Balance).sub(amount),
            )
            .col_expr(wallet::Column::UpdatedAt, Expr::value(now))
            .filter(wallet::Column::Id.eq(found.id))
            .filter(wallet::Column::Balance.gte(amount))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Wallet balance changed concurrently".to_string(),
            ));
        }

        let tx = wallet_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(found.id),
            amount: Set(-amount),
            kind: Set(kind),
            source: Set(source.to_string()),
            balance_after: Set(balance_after),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::WalletDebited {
                wallet_id: found.id,
                amount,
            })
            .await;

        Ok(tx)
    }

    /// Current wallet balance, zero when the wallet does not exist yet.
    pub async fn wallet_balance(
        &self,
        owner_id: Uuid,
        owner_type: WalletOwnerType,
    ) -> Result<Decimal, ServiceError> {
        let balance = wallet::Entity::find()
            .filter(wallet::Column::OwnerId.eq(owner_id))
            .filter(wallet::Column::OwnerType.eq(owner_type))
            .one(&*self.db)
            .await?
            .map(|w| w.balance)
            .unwrap_or(Decimal::ZERO);
        Ok(balance)
    }

    async fn find_or_create_points_account(
        &self,
        user_id: Uuid,
    ) -> Result<points_account::Model, ServiceError> {
        let existing = points_account::Entity::find()
            .filter(points_account::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        if let Some(found) = existing {
            return Ok(found);
        }

        let now = Utc::now();
        let created = points_account::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            balance: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        Ok(created)
    }

    /// Credits loyalty points, creating the account on first use.
    #[instrument(skip(self))]
    pub async fn earn_points(
        &self,
        user_id: Uuid,
        points: i64,
        reason: &str,
    ) -> Result<points_transaction::Model, ServiceError> {
        if points <= 0 {
            return Err(ServiceError::ValidationError(
                "Points credit must be positive".to_string(),
            ));
        }

        let lock = self.points_lock(user_id);
        let _guard = lock.lock().await;

        let account = self.find_or_create_points_account(user_id).await?;
        let balance_after = account.balance + points;
        let now = Utc::now();

        points_account::Entity::update_many()
            .col_expr(
                points_account::Column::Balance,
                Expr::col(points_account::Column::Balance).add(points),
            )
            .col_expr(points_account::Column::UpdatedAt, Expr::value(now))
            .filter(points_account::Column::Id.eq(account.id))
            .exec(&*self.db)
            .await?;

        let tx = points_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account.id),
            points: Set(points),
            kind: Set(PointsTransactionKind::Earn),
            reason: Set(reason.to_string()),
            balance_after: Set(balance_after),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::PointsEarned {
                account_id: account.id,
                points,
            })
            .await;

        Ok(tx)
    }

    /// Debits loyalty points. The caller is expected to have capped the
    /// spend at the balance already, so a shortfall here is a race.
    #[instrument(skip(self))]
    pub async fn spend_points(
        &self,
        user_id: Uuid,
        points: i64,
        reason: &str,
    ) -> Result<points_transaction::Model, ServiceError> {
        if points <= 0 {
            return Err(ServiceError::ValidationError(
                "Points debit must be positive".to_string(),
            ));
        }

        let lock = self.points_lock(user_id);
        let _guard = lock.lock().await;

        let account = points_account::Entity::find()
            .filter(points_account::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Conflict("Points account not found".to_string()))?;

        if account.balance < points {
            return Err(ServiceError::Conflict(format!(
                "Points balance {} does not cover {}",
                account.balance, points
            )));
        }

        let balance_after = account.balance - points;
        let now = Utc::now();

        let result = points_account::Entity::update_many()
            .col_expr(
                points_account::Column::Balance,
                Expr::col(points_account::Column::Balance).sub(points),
            )
            .col_expr(points_account::Column::UpdatedAt, Expr::value(now))
            .filter(points_account::Column::Id.eq(account.id))
            .filter(points_account::Column::Balance.gte(points))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Points balance changed concurrently".to_string(),
            ));
        }

        let tx = points_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account.id),
            points: Set(-points),
            kind: Set(PointsTransactionKind::Spend),
            reason: Set(reason.to_string()),
            balance_after: Set(balance_after),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::PointsSpent {
                account_id: account.id,
                points,
            })
            .await;

        Ok(tx)
    }

    /// Current points balance, zero when the account does not exist yet.
    pub async fn points_balance(&self, user_id: Uuid) -> Result<i64, ServiceError> {
        let balance = points_account::Entity::find()
            .filter(points_account::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .map(|a| a.balance)
            .unwrap_or(0);
        Ok(balance)
    }
}
