//! Booking storage.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "cancelled" => Self::Cancelled,
            _ => Self::Confirmed,
        }
    }
}

/// A stay at one of the community spaces.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Which space, e.g. `"eco-pod"` or `"community-dome"`.
    pub space: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub guests: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub account_id: Uuid,
    pub space: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub guests: i32,
}

/// Storage operations for bookings.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, new: NewBooking) -> Result<Booking>;

    /// Bookings for an account, most recent first.
    async fn list(&self, account_id: Uuid) -> Result<Vec<Booking>>;

    async fn find(&self, id: Uuid) -> Result<Option<Booking>>;

    /// Cancel a confirmed booking. Returns false when it was already
    /// cancelled or does not exist.
    async fn cancel(&self, id: Uuid) -> Result<bool>;
}

/// In-memory booking store for testing.
pub mod in_memory {
    use std::sync::{Arc, RwLock};

    use super::*;

    /// In-memory [`BookingStore`].
    #[derive(Default, Clone)]
    pub struct InMemoryBookingStore {
        bookings: Arc<RwLock<Vec<Booking>>>,
    }

    impl InMemoryBookingStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl BookingStore for InMemoryBookingStore {
        async fn create(&self, new: NewBooking) -> Result<Booking> {
            let booking = Booking {
                id: Uuid::new_v4(),
                account_id: new.account_id,
                space: new.space,
                starts_on: new.starts_on,
                ends_on: new.ends_on,
                guests: new.guests,
                status: BookingStatus::Confirmed,
                created_at: Utc::now(),
            };
            self.bookings.write().unwrap().push(booking.clone());
            Ok(booking)
        }

        async fn list(&self, account_id: Uuid) -> Result<Vec<Booking>> {
            let mut bookings: Vec<Booking> = self
                .bookings
                .read()
                .unwrap()
                .iter()
                .filter(|b| b.account_id == account_id)
                .cloned()
                .collect();
            bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(bookings)
        }

        async fn find(&self, id: Uuid) -> Result<Option<Booking>> {
            Ok(self
                .bookings
                .read()
                .unwrap()
                .iter()
                .find(|b| b.id == id)
                .cloned())
        }

        async fn cancel(&self, id: Uuid) -> Result<bool> {
            let mut bookings = self.bookings.write().unwrap();
            match bookings
                .iter_mut()
                .find(|b| b.id == id && b.status == BookingStatus::Confirmed)
            {
                Some(booking) => {
                    booking.status = BookingStatus::Cancelled;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}

pub use in_memory::InMemoryBookingStore;
