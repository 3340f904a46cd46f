//! SeaORM-backed ledger storage.
//!
//! The denormalized balance on the account row is the source of truth for
//! spends: debits are a conditional `UPDATE ... WHERE coin_balance >= amount`
//! so two concurrent spends cannot both succeed against the same coins.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use chrono::Utc;
use uuid::Uuid;

use super::storage::{Direction, LedgerEntry, LedgerStore};
use crate::accounts::sea_orm_store::{entity as account_entity, AccountEntity};
use crate::error::{ApiError, Result};

pub(crate) mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "ledger_entries")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub account_id: Uuid,
        pub direction: String,
        pub amount: i64,
        pub reason: String,
        pub balance_after: i64,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

use entity::Entity as LedgerEntity;

impl From<entity::Model> for LedgerEntry {
    fn from(model: entity::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            direction: Direction::from_str(&model.direction),
            amount: model.amount,
            reason: model.reason,
            balance_after: model.balance_after,
            created_at: model.created_at,
        }
    }
}

/// Ledger store backed by Postgres via SeaORM.
#[derive(Clone)]
pub struct SeaOrmLedgerStore {
    db: DatabaseConnection,
}

impl SeaOrmLedgerStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn balance_on<C: sea_orm::ConnectionTrait>(
        conn: &C,
        account_id: Uuid,
    ) -> Result<i64> {
        let account = AccountEntity::find_by_id(account_id)
            .one(conn)
            .await?
            .ok_or_else(|| ApiError::not_found("Account not found"))?;
        Ok(account.coin_balance)
    }

    async fn append_entry<C: sea_orm::ConnectionTrait>(
        conn: &C,
        account_id: Uuid,
        direction: Direction,
        amount: i64,
        reason: &str,
        balance_after: i64,
    ) -> Result<LedgerEntry> {
        let model = entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account_id),
            direction: Set(direction.as_str().to_string()),
            amount: Set(amount),
            reason: Set(reason.to_string()),
            balance_after: Set(balance_after),
            created_at: Set(Utc::now()),
        };
        Ok(LedgerEntry::from(model.insert(conn).await?))
    }
}

#[async_trait]
impl LedgerStore for SeaOrmLedgerStore {
    async fn credit(&self, account_id: Uuid, amount: i64, reason: &str) -> Result<LedgerEntry> {
        let txn = self.db.begin().await?;

        let updated = AccountEntity::update_many()
            .col_expr(
                account_entity::Column::CoinBalance,
                Expr::col(account_entity::Column::CoinBalance).add(amount),
            )
            .filter(account_entity::Column::Id.eq(account_id))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Err(ApiError::not_found("Account not found"));
        }

        let balance_after = Self::balance_on(&txn, account_id).await?;
        let entry = Self::append_entry(
            &txn,
            account_id,
            Direction::Credit,
            amount,
            reason,
            balance_after,
        )
        .await?;

        txn.commit().await?;
        Ok(entry)
    }

    async fn debit(
        &self,
        account_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> Result<Option<LedgerEntry>> {
        let txn = self.db.begin().await?;

        // Balance check and decrement in one statement.
        let updated = AccountEntity::update_many()
            .col_expr(
                account_entity::Column::CoinBalance,
                Expr::col(account_entity::Column::CoinBalance).sub(amount),
            )
            .filter(account_entity::Column::Id.eq(account_id))
            .filter(account_entity::Column::CoinBalance.gte(amount))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let balance_after = Self::balance_on(&txn, account_id).await?;
        let entry = Self::append_entry(
            &txn,
            account_id,
            Direction::Debit,
            amount,
            reason,
            balance_after,
        )
        .await?;

        txn.commit().await?;
        Ok(Some(entry))
    }

    async fn balance(&self, account_id: Uuid) -> Result<i64> {
        Self::balance_on(&self.db, account_id).await
    }

    async fn history(&self, account_id: Uuid, limit: u64) -> Result<Vec<LedgerEntry>> {
        let models = LedgerEntity::find()
            .filter(entity::Column::AccountId.eq(account_id))
            .order_by_desc(entity::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(LedgerEntry::from).collect())
    }

    async fn has_reason(&self, account_id: Uuid, reason: &str) -> Result<bool> {
        let found = LedgerEntity::find()
            .filter(entity::Column::AccountId.eq(account_id))
            .filter(entity::Column::Reason.eq(reason))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }
}
