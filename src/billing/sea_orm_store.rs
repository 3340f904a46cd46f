//! SeaORM-backed billing storage.
//!
//! Activation runs in a transaction with a conditional charge update, so two
//! concurrent activations of the same order race on the `pending` status and
//! exactly one wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use uuid::Uuid;

use super::storage::{
    Activation, BillingStore, ChargeStatus, NewCharge, PendingCharge, PlanRecord, PlanRecordStatus,
};
use crate::accounts::sea_orm_store::{entity as account_entity, AccountEntity};
use crate::accounts::{PlanStatus, PlanTier};
use crate::error::{ApiError, Result};

pub(crate) mod charge_entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "pending_charges")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub order_id: String,
        pub account_id: Uuid,
        pub tier: String,
        pub plan_name: String,
        pub amount: i64,
        pub currency: String,
        pub status: String,
        pub payment_id: Option<String>,
        pub signature: Option<String>,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub(crate) mod record_entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "plan_records")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub account_id: Uuid,
        pub tier: String,
        pub plan_name: String,
        pub amount: i64,
        pub currency: String,
        pub status: String,
        pub order_id: String,
        pub payment_id: String,
        pub starts_at: DateTimeUtc,
        pub ends_at: DateTimeUtc,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub(crate) mod event_entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "webhook_events")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub event_id: String,
        pub processed_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

use charge_entity::Entity as ChargeEntity;
use event_entity::Entity as EventEntity;
use record_entity::Entity as RecordEntity;

impl From<charge_entity::Model> for PendingCharge {
    fn from(model: charge_entity::Model) -> Self {
        Self {
            order_id: model.order_id,
            account_id: model.account_id,
            tier: PlanTier::parse(&model.tier).unwrap_or(PlanTier::Resident),
            plan_name: model.plan_name,
            amount: model.amount,
            currency: model.currency,
            status: ChargeStatus::from_str(&model.status),
            payment_id: model.payment_id,
            signature: model.signature,
            created_at: model.created_at,
        }
    }
}

impl From<record_entity::Model> for PlanRecord {
    fn from(model: record_entity::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            tier: PlanTier::parse(&model.tier).unwrap_or(PlanTier::Resident),
            plan_name: model.plan_name,
            amount: model.amount,
            currency: model.currency,
            status: PlanRecordStatus::from_str(&model.status),
            order_id: model.order_id,
            payment_id: model.payment_id,
            starts_at: model.starts_at,
            ends_at: model.ends_at,
            created_at: model.created_at,
        }
    }
}

/// Billing store backed by Postgres via SeaORM.
#[derive(Clone)]
pub struct SeaOrmBillingStore {
    db: DatabaseConnection,
}

impl SeaOrmBillingStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BillingStore for SeaOrmBillingStore {
    async fn create_charge(&self, new: NewCharge) -> Result<PendingCharge> {
        let model = charge_entity::ActiveModel {
            order_id: Set(new.order_id),
            account_id: Set(new.account_id),
            tier: Set(new.tier.as_str().to_string()),
            plan_name: Set(new.plan_name),
            amount: Set(new.amount),
            currency: Set(new.currency),
            status: Set(ChargeStatus::Pending.as_str().to_string()),
            payment_id: Set(None),
            signature: Set(None),
            created_at: Set(Utc::now()),
        };
        let inserted = model.insert(&self.db).await?;
        Ok(PendingCharge::from(inserted))
    }

    async fn get_charge(&self, order_id: &str) -> Result<Option<PendingCharge>> {
        let model = ChargeEntity::find_by_id(order_id).one(&self.db).await?;
        Ok(model.map(PendingCharge::from))
    }

    async fn activate(&self, activation: Activation) -> Result<PlanRecord> {
        let txn = self.db.begin().await?;

        let charge = ChargeEntity::find_by_id(activation.order_id.as_str())
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::bad_request("Unknown order"))?;

        // The pending filter makes this a compare-and-swap: a replayed or
        // concurrent activation matches zero rows.
        let updated = ChargeEntity::update_many()
            .col_expr(
                charge_entity::Column::Status,
                Expr::value(ChargeStatus::Completed.as_str()),
            )
            .col_expr(
                charge_entity::Column::PaymentId,
                Expr::value(Some(activation.payment_id.clone())),
            )
            .col_expr(
                charge_entity::Column::Signature,
                Expr::value(Some(activation.signature.clone())),
            )
            .filter(charge_entity::Column::OrderId.eq(&activation.order_id))
            .filter(charge_entity::Column::Status.eq(ChargeStatus::Pending.as_str()))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Err(ApiError::bad_request("Payment already processed"));
        }

        let record = record_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(activation.account_id),
            tier: Set(charge.tier.clone()),
            plan_name: Set(charge.plan_name.clone()),
            amount: Set(charge.amount),
            currency: Set(charge.currency.clone()),
            status: Set(PlanRecordStatus::Active.as_str().to_string()),
            order_id: Set(activation.order_id.clone()),
            payment_id: Set(activation.payment_id.clone()),
            starts_at: Set(activation.starts_at),
            ends_at: Set(activation.ends_at),
            created_at: Set(Utc::now()),
        };
        let inserted = record.insert(&txn).await?;

        AccountEntity::update_many()
            .col_expr(
                account_entity::Column::PlanTier,
                Expr::value(Some(charge.tier)),
            )
            .col_expr(
                account_entity::Column::PlanStatus,
                Expr::value(PlanStatus::Active.as_str()),
            )
            .col_expr(
                account_entity::Column::PlanStartedAt,
                Expr::value(Some(activation.starts_at)),
            )
            .col_expr(
                account_entity::Column::PlanEndsAt,
                Expr::value(Some(activation.ends_at)),
            )
            .filter(account_entity::Column::Id.eq(activation.account_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(PlanRecord::from(inserted))
    }

    async fn mark_charge_failed(&self, order_id: &str) -> Result<bool> {
        let updated = ChargeEntity::update_many()
            .col_expr(
                charge_entity::Column::Status,
                Expr::value(ChargeStatus::Failed.as_str()),
            )
            .filter(charge_entity::Column::OrderId.eq(order_id))
            .filter(charge_entity::Column::Status.eq(ChargeStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;
        Ok(updated.rows_affected > 0)
    }

    async fn get_active_plan_record(&self, account_id: Uuid) -> Result<Option<PlanRecord>> {
        let model = RecordEntity::find()
            .filter(record_entity::Column::AccountId.eq(account_id))
            .filter(record_entity::Column::Status.eq(PlanRecordStatus::Active.as_str()))
            .one(&self.db)
            .await?;
        Ok(model.map(PlanRecord::from))
    }

    async fn plan_history(&self, account_id: Uuid) -> Result<Vec<PlanRecord>> {
        let models = RecordEntity::find()
            .filter(record_entity::Column::AccountId.eq(account_id))
            .order_by_desc(record_entity::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(PlanRecord::from).collect())
    }

    async fn cancel_active_plan(&self, account_id: Uuid) -> Result<bool> {
        let txn = self.db.begin().await?;

        let updated = RecordEntity::update_many()
            .col_expr(
                record_entity::Column::Status,
                Expr::value(PlanRecordStatus::Cancelled.as_str()),
            )
            .filter(record_entity::Column::AccountId.eq(account_id))
            .filter(record_entity::Column::Status.eq(PlanRecordStatus::Active.as_str()))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        AccountEntity::update_many()
            .col_expr(
                account_entity::Column::PlanTier,
                Expr::value(None::<String>),
            )
            .col_expr(
                account_entity::Column::PlanStatus,
                Expr::value(PlanStatus::Cancelled.as_str()),
            )
            .col_expr(
                account_entity::Column::PlanStartedAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .col_expr(
                account_entity::Column::PlanEndsAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .filter(account_entity::Column::Id.eq(account_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(true)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let txn = self.db.begin().await?;

        let overdue = RecordEntity::find()
            .filter(record_entity::Column::Status.eq(PlanRecordStatus::Active.as_str()))
            .filter(record_entity::Column::EndsAt.lte(now))
            .all(&txn)
            .await?;
        if overdue.is_empty() {
            txn.commit().await?;
            return Ok(0);
        }

        let account_ids: Vec<Uuid> = overdue.iter().map(|r| r.account_id).collect();
        let updated = RecordEntity::update_many()
            .col_expr(
                record_entity::Column::Status,
                Expr::value(PlanRecordStatus::Expired.as_str()),
            )
            .filter(record_entity::Column::Status.eq(PlanRecordStatus::Active.as_str()))
            .filter(record_entity::Column::EndsAt.lte(now))
            .exec(&txn)
            .await?;

        AccountEntity::update_many()
            .col_expr(
                account_entity::Column::PlanTier,
                Expr::value(None::<String>),
            )
            .col_expr(
                account_entity::Column::PlanStatus,
                Expr::value(PlanStatus::Expired.as_str()),
            )
            .col_expr(
                account_entity::Column::PlanStartedAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .col_expr(
                account_entity::Column::PlanEndsAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .filter(account_entity::Column::Id.is_in(account_ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(updated.rows_affected)
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool> {
        let model = EventEntity::find_by_id(event_id).one(&self.db).await?;
        Ok(model.is_some())
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<bool> {
        let model = event_entity::ActiveModel {
            event_id: Set(event_id.to_string()),
            processed_at: Set(Utc::now()),
        };
        match model.insert(&self.db).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
