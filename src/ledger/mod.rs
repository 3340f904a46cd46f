//! Carbon coins: an integer balance per account with an append-only entry
//! log. Coins are earned through grants (signup bonus, admin credits) and
//! spent on bookings and perks.

pub mod sea_orm_store;
pub mod storage;

pub use sea_orm_store::SeaOrmLedgerStore;
pub use storage::{Direction, InMemoryLedgerStore, LedgerEntry, LedgerStore};

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Coins granted once per account at signup.
pub const SIGNUP_BONUS_AMOUNT: i64 = 50;

/// Reserved reason string for the signup grant; its presence in the log is
/// what makes the grant one-shot.
pub const SIGNUP_BONUS_REASON: &str = "Signup bonus";

/// Maximum number of history entries returned per request.
const HISTORY_LIMIT_MAX: u64 = 100;
const HISTORY_LIMIT_DEFAULT: u64 = 50;

/// Validates and applies coin movements.
#[derive(Clone)]
pub struct LedgerManager {
    store: Arc<dyn LedgerStore>,
}

impl LedgerManager {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Add coins to an account. The signup-bonus reason is reserved for
    /// [`Self::claim_signup_bonus`]: a plain credit under it would make the
    /// later legitimate claim look already taken.
    pub async fn credit(&self, account_id: Uuid, amount: i64, reason: &str) -> Result<LedgerEntry> {
        validate_amount(amount)?;
        if reason == SIGNUP_BONUS_REASON {
            return Err(ApiError::bad_request("Reason is reserved"));
        }
        let entry = self.store.credit(account_id, amount, reason).await?;
        tracing::info!(
            account_id = %account_id,
            amount,
            reason,
            balance = entry.balance_after,
            "Coins credited"
        );
        Ok(entry)
    }

    /// Spend coins. Fails without writing anything when the balance does not
    /// cover the amount.
    pub async fn debit(&self, account_id: Uuid, amount: i64, reason: &str) -> Result<LedgerEntry> {
        validate_amount(amount)?;
        let entry = self
            .store
            .debit(account_id, amount, reason)
            .await?
            .ok_or_else(|| ApiError::bad_request("Insufficient balance"))?;
        tracing::info!(
            account_id = %account_id,
            amount,
            reason,
            balance = entry.balance_after,
            "Coins debited"
        );
        Ok(entry)
    }

    /// Grant the one-time signup bonus. Rejected when the account has ever
    /// received it, so replays and repeated claims are no-ops.
    pub async fn claim_signup_bonus(&self, account_id: Uuid) -> Result<LedgerEntry> {
        if self
            .store
            .has_reason(account_id, SIGNUP_BONUS_REASON)
            .await?
        {
            return Err(ApiError::bad_request("Signup bonus already claimed"));
        }
        let entry = self
            .store
            .credit(account_id, SIGNUP_BONUS_AMOUNT, SIGNUP_BONUS_REASON)
            .await?;
        tracing::info!(
            account_id = %account_id,
            balance = entry.balance_after,
            "Signup bonus credited"
        );
        Ok(entry)
    }

    pub async fn balance(&self, account_id: Uuid) -> Result<i64> {
        self.store.balance(account_id).await
    }

    /// Ledger history, most recent first. `limit` defaults to
    /// 50 and is capped at 100.
    pub async fn history(&self, account_id: Uuid, limit: Option<u64>) -> Result<Vec<LedgerEntry>> {
        let limit = limit
            .unwrap_or(HISTORY_LIMIT_DEFAULT)
            .clamp(1, HISTORY_LIMIT_MAX);
        self.store.history(account_id, limit).await
    }
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(ApiError::bad_request("Amount must be a positive integer"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountStore, InMemoryAccountStore, NewAccount};

    async fn setup() -> (InMemoryAccountStore, LedgerManager, Uuid) {
        let accounts = InMemoryAccountStore::new();
        let account = accounts.create(NewAccount::default()).await.unwrap();
        let manager = LedgerManager::new(Arc::new(InMemoryLedgerStore::new(accounts.clone())));
        (accounts, manager, account.id)
    }

    #[tokio::test]
    async fn test_earn_and_spend_sequence() {
        let (_, manager, account_id) = setup().await;

        assert_eq!(manager.balance(account_id).await.unwrap(), 0);
        manager.claim_signup_bonus(account_id).await.unwrap();
        assert_eq!(manager.balance(account_id).await.unwrap(), 50);
        manager.debit(account_id, 30, "Workshop").await.unwrap();
        assert_eq!(manager.balance(account_id).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_bonus_claimed_once() {
        let (_, manager, account_id) = setup().await;

        manager.claim_signup_bonus(account_id).await.unwrap();
        let err = manager.claim_signup_bonus(account_id).await.unwrap_err();
        assert!(err.to_string().contains("already claimed"));
        assert_eq!(manager.balance(account_id).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_reserved_reason_rejected_on_plain_credit() {
        let (_, manager, account_id) = setup().await;

        let err = manager
            .credit(account_id, 10, SIGNUP_BONUS_REASON)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reserved"));
        assert_eq!(manager.balance(account_id).await.unwrap(), 0);

        // The legitimate claim still goes through afterwards.
        manager.claim_signup_bonus(account_id).await.unwrap();
        assert_eq!(manager.balance(account_id).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let (_, manager, account_id) = setup().await;
        manager.credit(account_id, 10, "grant").await.unwrap();

        let err = manager.debit(account_id, 11, "spend").await.unwrap_err();
        assert!(err.to_string().contains("Insufficient balance"));
        assert_eq!(manager.balance(account_id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let (_, manager, account_id) = setup().await;

        for amount in [0, -1, -50] {
            assert!(manager.credit(account_id, amount, "x").await.is_err());
            assert!(manager.debit(account_id, amount, "x").await.is_err());
        }
        assert_eq!(manager.balance(account_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_limit_clamped() {
        let (_, manager, account_id) = setup().await;
        for i in 0..5 {
            manager.credit(account_id, 1, &format!("grant {i}")).await.unwrap();
        }

        assert_eq!(
            manager.history(account_id, Some(2)).await.unwrap().len(),
            2
        );
        assert_eq!(
            manager.history(account_id, None).await.unwrap().len(),
            5
        );
        // A zero limit still returns something rather than nothing.
        assert_eq!(
            manager.history(account_id, Some(0)).await.unwrap().len(),
            1
        );
    }
}
