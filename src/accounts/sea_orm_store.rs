//! SeaORM-backed account storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use uuid::Uuid;

use super::storage::{AccountStore, NewAccount, ProfileUpdate};
use super::{Account, PlanStatus, PlanTier};
use crate::error::{ApiError, Result};

pub(crate) mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "accounts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub email: Option<String>,
        #[sea_orm(unique)]
        pub phone: Option<String>,
        pub password_hash: Option<String>,
        #[sea_orm(unique)]
        pub google_sub: Option<String>,
        pub name: Option<String>,
        pub plan_tier: Option<String>,
        pub plan_status: String,
        pub plan_started_at: Option<DateTimeUtc>,
        pub plan_ends_at: Option<DateTimeUtc>,
        pub coin_balance: i64,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub(crate) use entity::Entity as AccountEntity;

impl From<entity::Model> for Account {
    fn from(model: entity::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            phone: model.phone,
            password_hash: model.password_hash,
            google_sub: model.google_sub,
            name: model.name,
            plan_tier: model.plan_tier.as_deref().and_then(PlanTier::parse),
            plan_status: PlanStatus::from_str(&model.plan_status),
            plan_started_at: model.plan_started_at,
            plan_ends_at: model.plan_ends_at,
            coin_balance: model.coin_balance,
            created_at: model.created_at,
        }
    }
}

/// Account store backed by Postgres via SeaORM.
#[derive(Clone)]
pub struct SeaOrmAccountStore {
    db: DatabaseConnection,
}

impl SeaOrmAccountStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for SeaOrmAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let model = AccountEntity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Account::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let model = AccountEntity::find()
            .filter(entity::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await?;
        Ok(model.map(Account::from))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>> {
        let model = AccountEntity::find()
            .filter(entity::Column::Phone.eq(phone))
            .one(&self.db)
            .await?;
        Ok(model.map(Account::from))
    }

    async fn find_by_google_sub(&self, sub: &str) -> Result<Option<Account>> {
        let model = AccountEntity::find()
            .filter(entity::Column::GoogleSub.eq(sub))
            .one(&self.db)
            .await?;
        Ok(model.map(Account::from))
    }

    async fn create(&self, new: NewAccount) -> Result<Account> {
        let model = entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new.email.map(|e| e.to_lowercase())),
            phone: Set(new.phone),
            password_hash: Set(new.password_hash),
            google_sub: Set(new.google_sub),
            name: Set(new.name),
            plan_tier: Set(None),
            plan_status: Set(PlanStatus::Inactive.as_str().to_string()),
            plan_started_at: Set(None),
            plan_ends_at: Set(None),
            coin_balance: Set(0),
            created_at: Set(Utc::now()),
        };
        let inserted = model.insert(&self.db).await?;
        Ok(Account::from(inserted))
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Account> {
        let model = AccountEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Account not found"))?;

        let mut active = model.into_active_model();
        if let Some(name) = update.name {
            active.name = Set(Some(name));
        }
        if let Some(email) = update.email {
            active.email = Set(Some(email.to_lowercase()));
        }
        if let Some(phone) = update.phone {
            active.phone = Set(Some(phone));
        }
        let updated = active.update(&self.db).await?;
        Ok(Account::from(updated))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        AccountEntity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn set_plan(
        &self,
        id: Uuid,
        tier: Option<PlanTier>,
        status: PlanStatus,
        started_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = AccountEntity::update_many()
            .col_expr(
                entity::Column::PlanTier,
                sea_orm::sea_query::Expr::value(tier.map(|t| t.as_str().to_string())),
            )
            .col_expr(
                entity::Column::PlanStatus,
                sea_orm::sea_query::Expr::value(status.as_str().to_string()),
            )
            .col_expr(
                entity::Column::PlanStartedAt,
                sea_orm::sea_query::Expr::value(started_at),
            )
            .col_expr(
                entity::Column::PlanEndsAt,
                sea_orm::sea_query::Expr::value(ends_at),
            )
            .filter(entity::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ApiError::not_found("Account not found"));
        }
        Ok(())
    }
}
