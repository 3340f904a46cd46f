//! Carbon-coin ledger storage.
//!
//! Every balance change is an append-only entry; the account row carries a
//! denormalized balance that the store keeps in step with the entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

/// Which way coins moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "debit" => Self::Debit,
            _ => Self::Credit,
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub direction: Direction,
    /// Always positive; the direction carries the sign.
    pub amount: i64,
    pub reason: String,
    /// Balance after this entry was applied.
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Storage operations for the coin ledger.
///
/// Debits are conditional: the store must check the balance and apply the
/// decrement as one atomic step so concurrent spends cannot overdraw.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Add coins and append an entry. Returns the entry with the new balance.
    async fn credit(&self, account_id: Uuid, amount: i64, reason: &str) -> Result<LedgerEntry>;

    /// Remove coins when the balance covers it. Returns `None` when it does
    /// not; the balance is untouched in that case.
    async fn debit(
        &self,
        account_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> Result<Option<LedgerEntry>>;

    async fn balance(&self, account_id: Uuid) -> Result<i64>;

    /// Entries for an account, most recent first, capped at `limit`.
    async fn history(&self, account_id: Uuid, limit: u64) -> Result<Vec<LedgerEntry>>;

    /// Whether the account already has an entry with this reason. Used to
    /// keep one-shot grants one-shot.
    async fn has_reason(&self, account_id: Uuid, reason: &str) -> Result<bool>;
}

/// In-memory ledger for testing.
///
/// Holds a clone of the in-memory account store so the denormalized balance
/// lands on the same accounts the rest of the test sees.
pub mod in_memory {
    use std::sync::{Arc, RwLock};

    use super::*;
    use crate::accounts::InMemoryAccountStore;

    /// In-memory [`LedgerStore`].
    #[derive(Clone)]
    pub struct InMemoryLedgerStore {
        accounts: InMemoryAccountStore,
        entries: Arc<RwLock<Vec<LedgerEntry>>>,
    }

    impl InMemoryLedgerStore {
        #[must_use]
        pub fn new(accounts: InMemoryAccountStore) -> Self {
            Self {
                accounts,
                entries: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedgerStore {
        async fn credit(&self, account_id: Uuid, amount: i64, reason: &str) -> Result<LedgerEntry> {
            let balance_after = self.accounts.credit_balance(account_id, amount)?;
            let entry = LedgerEntry {
                id: Uuid::new_v4(),
                account_id,
                direction: Direction::Credit,
                amount,
                reason: reason.to_string(),
                balance_after,
                created_at: Utc::now(),
            };
            self.entries.write().unwrap().push(entry.clone());
            Ok(entry)
        }

        async fn debit(
            &self,
            account_id: Uuid,
            amount: i64,
            reason: &str,
        ) -> Result<Option<LedgerEntry>> {
            let Some(balance_after) = self.accounts.debit_balance_if_sufficient(account_id, amount)?
            else {
                return Ok(None);
            };
            let entry = LedgerEntry {
                id: Uuid::new_v4(),
                account_id,
                direction: Direction::Debit,
                amount,
                reason: reason.to_string(),
                balance_after,
                created_at: Utc::now(),
            };
            self.entries.write().unwrap().push(entry.clone());
            Ok(Some(entry))
        }

        async fn balance(&self, account_id: Uuid) -> Result<i64> {
            use crate::accounts::AccountStore;
            Ok(self
                .accounts
                .find_by_id(account_id)
                .await?
                .map(|a| a.coin_balance)
                .unwrap_or(0))
        }

        async fn history(&self, account_id: Uuid, limit: u64) -> Result<Vec<LedgerEntry>> {
            let entries = self.entries.read().unwrap();
            Ok(entries
                .iter()
                .rev()
                .filter(|e| e.account_id == account_id)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn has_reason(&self, account_id: Uuid, reason: &str) -> Result<bool> {
            Ok(self
                .entries
                .read()
                .unwrap()
                .iter()
                .any(|e| e.account_id == account_id && e.reason == reason))
        }
    }
}

pub use in_memory::InMemoryLedgerStore;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountStore, InMemoryAccountStore, NewAccount};

    async fn setup() -> (InMemoryLedgerStore, Uuid) {
        let accounts = InMemoryAccountStore::new();
        let account = accounts.create(NewAccount::default()).await.unwrap();
        (InMemoryLedgerStore::new(accounts), account.id)
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let (store, account_id) = setup().await;

        let entry = store.credit(account_id, 50, "Signup bonus").await.unwrap();
        assert_eq!(entry.balance_after, 50);
        assert_eq!(entry.direction, Direction::Credit);

        let entry = store
            .debit(account_id, 30, "Workshop booking")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.balance_after, 20);
        assert_eq!(store.balance(account_id).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_overdraw_returns_none() {
        let (store, account_id) = setup().await;
        store.credit(account_id, 10, "grant").await.unwrap();

        assert!(store.debit(account_id, 11, "spend").await.unwrap().is_none());
        // Balance and history untouched.
        assert_eq!(store.balance(account_id).await.unwrap(), 10);
        assert_eq!(store.history(account_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_most_recent_first() {
        let (store, account_id) = setup().await;
        store.credit(account_id, 1, "first").await.unwrap();
        store.credit(account_id, 2, "second").await.unwrap();
        store.credit(account_id, 3, "third").await.unwrap();

        let history = store.history(account_id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason, "third");
        assert_eq!(history[1].reason, "second");
    }

    #[tokio::test]
    async fn test_has_reason() {
        let (store, account_id) = setup().await;
        assert!(!store.has_reason(account_id, "Signup bonus").await.unwrap());
        store.credit(account_id, 50, "Signup bonus").await.unwrap();
        assert!(store.has_reason(account_id, "Signup bonus").await.unwrap());
    }
}
