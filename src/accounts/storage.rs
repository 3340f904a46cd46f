//! Account storage trait and the in-memory implementation used by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Account, PlanStatus, PlanTier};
use crate::error::{ApiError, Result};

/// Fields for creating a new account.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub google_sub: Option<String>,
    pub name: Option<String>,
}

/// Fields a member may change on their own profile.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Storage operations for accounts.
///
/// Production uses [`super::SeaOrmAccountStore`]; tests use
/// [`InMemoryAccountStore`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>>;

    async fn find_by_google_sub(&self, sub: &str) -> Result<Option<Account>>;

    /// Create an account. New accounts start with no plan and a zero balance.
    async fn create(&self, new: NewAccount) -> Result<Account>;

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Account>;

    /// Delete the account. Dependent records (charges, plan records, ledger
    /// entries, bookings) cascade in the database schema.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Update the denormalized plan fields. Used by cancellation, webhook
    /// syncing, and the expiry sweep; activation updates them inside its own
    /// transaction.
    async fn set_plan(
        &self,
        id: Uuid,
        tier: Option<PlanTier>,
        status: PlanStatus,
        started_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// In-memory account store for tests.
///
/// Wraps data in `Arc` for cheap cloning; the in-memory billing and ledger
/// stores hold a clone so balance and plan updates land on the same map.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    inner: std::sync::Arc<std::sync::RwLock<std::collections::HashMap<Uuid, Account>>>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the balance, returning the new balance.
    pub fn credit_balance(&self, id: Uuid, amount: i64) -> Result<i64> {
        let mut accounts = self.inner.write().unwrap();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("Account not found"))?;
        account.coin_balance += amount;
        Ok(account.coin_balance)
    }

    /// Subtract `amount` when the balance covers it, returning the new
    /// balance, or `None` when it does not. The check and the write happen
    /// under one lock, mirroring the conditional UPDATE the database store
    /// uses.
    pub fn debit_balance_if_sufficient(&self, id: Uuid, amount: i64) -> Result<Option<i64>> {
        let mut accounts = self.inner.write().unwrap();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("Account not found"))?;
        if account.coin_balance < amount {
            return Ok(None);
        }
        account.coin_balance -= amount;
        Ok(Some(account.coin_balance))
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.inner.read().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = email.to_lowercase();
        Ok(self
            .inner
            .read()
            .unwrap()
            .values()
            .find(|a| a.email.as_deref() == Some(email.as_str()))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .values()
            .find(|a| a.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn find_by_google_sub(&self, sub: &str) -> Result<Option<Account>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .values()
            .find(|a| a.google_sub.as_deref() == Some(sub))
            .cloned())
    }

    async fn create(&self, new: NewAccount) -> Result<Account> {
        let account = Account {
            id: Uuid::new_v4(),
            email: new.email.map(|e| e.to_lowercase()),
            phone: new.phone,
            password_hash: new.password_hash,
            google_sub: new.google_sub,
            name: new.name,
            plan_tier: None,
            plan_status: PlanStatus::Inactive,
            plan_started_at: None,
            plan_ends_at: None,
            coin_balance: 0,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .unwrap()
            .insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Account> {
        let mut accounts = self.inner.write().unwrap();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("Account not found"))?;
        if let Some(name) = update.name {
            account.name = Some(name);
        }
        if let Some(email) = update.email {
            account.email = Some(email.to_lowercase());
        }
        if let Some(phone) = update.phone {
            account.phone = Some(phone);
        }
        Ok(account.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.inner.write().unwrap().remove(&id);
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
        let mut accounts = self.inner.write().unwrap();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("Account not found"))?;
        account.plan_tier = tier;
        account.plan_status = status;
        account.plan_started_at = started_at;
        account.plan_ends_at = ends_at;
        Ok(())
    }
}
