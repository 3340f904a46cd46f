//! SeaORM-backed booking storage.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::storage::{Booking, BookingStatus, BookingStore, NewBooking};
use crate::error::Result;

pub(crate) mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "bookings")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub account_id: Uuid,
        pub space: String,
        pub starts_on: Date,
        pub ends_on: Date,
        pub guests: i32,
        pub status: String,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

use entity::Entity as BookingEntity;

impl From<entity::Model> for Booking {
    fn from(model: entity::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            space: model.space,
            starts_on: model.starts_on,
            ends_on: model.ends_on,
            guests: model.guests,
            status: BookingStatus::from_str(&model.status),
            created_at: model.created_at,
        }
    }
}

/// Booking store backed by Postgres via SeaORM.
#[derive(Clone)]
pub struct SeaOrmBookingStore {
    db: DatabaseConnection,
}

impl SeaOrmBookingStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookingStore for SeaOrmBookingStore {
    async fn create(&self, new: NewBooking) -> Result<Booking> {
        let model = entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(new.account_id),
            space: Set(new.space),
            starts_on: Set(new.starts_on),
            ends_on: Set(new.ends_on),
            guests: Set(new.guests),
            status: Set(BookingStatus::Confirmed.as_str().to_string()),
            created_at: Set(Utc::now()),
        };
        let inserted = model.insert(&self.db).await?;
        Ok(Booking::from(inserted))
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<Booking>> {
        let models = BookingEntity::find()
            .filter(entity::Column::AccountId.eq(account_id))
            .order_by_desc(entity::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Booking::from).collect())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Booking>> {
        let model = BookingEntity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Booking::from))
    }

    async fn cancel(&self, id: Uuid) -> Result<bool> {
        let updated = BookingEntity::update_many()
            .col_expr(
                entity::Column::Status,
                Expr::value(BookingStatus::Cancelled.as_str()),
            )
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::Status.eq(BookingStatus::Confirmed.as_str()))
            .exec(&self.db)
            .await?;
        Ok(updated.rows_affected > 0)
    }
}
