//! Space bookings: members reserve stays at the community's spaces.

pub mod sea_orm_store;
pub mod storage;

pub use sea_orm_store::SeaOrmBookingStore;
pub use storage::{Booking, BookingStatus, BookingStore, InMemoryBookingStore, NewBooking};

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, Result};

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub space: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub guests: i32,
}

/// Validates and records bookings.
#[derive(Clone)]
pub struct BookingManager {
    store: Arc<dyn BookingStore>,
}

impl BookingManager {
    #[must_use]
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, account_id: Uuid, request: BookingRequest) -> Result<Booking> {
        if request.space.trim().is_empty() {
            return Err(ApiError::bad_request("Space is required"));
        }
        if request.guests < 1 {
            return Err(ApiError::bad_request("Guest count must be at least 1"));
        }
        if request.starts_on >= request.ends_on {
            return Err(ApiError::bad_request("End date must be after start date"));
        }
        if request.starts_on < Utc::now().date_naive() {
            return Err(ApiError::bad_request("Start date must be in the future"));
        }

        let booking = self
            .store
            .create(NewBooking {
                account_id,
                space: request.space.trim().to_string(),
                starts_on: request.starts_on,
                ends_on: request.ends_on,
                guests: request.guests,
            })
            .await?;

        tracing::info!(
            account_id = %account_id,
            booking_id = %booking.id,
            space = %booking.space,
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn list(&self, account_id: Uuid) -> Result<Vec<Booking>> {
        self.store.list(account_id).await
    }

    /// Cancel one of the account's bookings. Cancelling someone else's
    /// booking is a 404, not a 403, so ids cannot be probed.
    pub async fn cancel(&self, account_id: Uuid, booking_id: Uuid) -> Result<()> {
        let booking = self
            .store
            .find(booking_id)
            .await?
            .filter(|b| b.account_id == account_id)
            .ok_or_else(|| ApiError::not_found("Booking not found"))?;

        if !self.store.cancel(booking.id).await? {
            return Err(ApiError::bad_request("Booking is already cancelled"));
        }
        tracing::info!(account_id = %account_id, booking_id = %booking_id, "Booking cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn manager() -> BookingManager {
        BookingManager::new(Arc::new(InMemoryBookingStore::new()))
    }

    fn valid_request() -> BookingRequest {
        let today = Utc::now().date_naive();
        BookingRequest {
            space: "eco-pod".to_string(),
            starts_on: today + Duration::days(7),
            ends_on: today + Duration::days(9),
            guests: 2,
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let manager = manager();
        let account_id = Uuid::new_v4();

        let booking = manager.create(account_id, valid_request()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let bookings = manager.list(account_id).await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].id, booking.id);

        // Other accounts see nothing.
        assert!(manager.list(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation() {
        let manager = manager();
        let account_id = Uuid::new_v4();
        let today = Utc::now().date_naive();

        let mut request = valid_request();
        request.guests = 0;
        assert!(manager.create(account_id, request).await.is_err());

        let mut request = valid_request();
        request.ends_on = request.starts_on;
        assert!(manager.create(account_id, request).await.is_err());

        let mut request = valid_request();
        request.starts_on = today - Duration::days(1);
        assert!(manager.create(account_id, request).await.is_err());

        let mut request = valid_request();
        request.space = "  ".to_string();
        assert!(manager.create(account_id, request).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel() {
        let manager = manager();
        let account_id = Uuid::new_v4();
        let booking = manager.create(account_id, valid_request()).await.unwrap();

        manager.cancel(account_id, booking.id).await.unwrap();
        let err = manager.cancel(account_id, booking.id).await.unwrap_err();
        assert!(err.to_string().contains("already cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_foreign_booking_is_not_found() {
        let manager = manager();
        let owner = Uuid::new_v4();
        let booking = manager.create(owner, valid_request()).await.unwrap();

        let err = manager
            .cancel(Uuid::new_v4(), booking.id)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
