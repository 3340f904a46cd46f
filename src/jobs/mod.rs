//! Background jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::billing::BillingStore;

/// Periodically expires subscriptions whose paid period has lapsed.
///
/// Without the sweep an account could keep an `active` status forever; the
/// sweep moves lapsed plan records to `expired` and downgrades the owning
/// accounts.
pub struct ExpirySweeper {
    store: Arc<dyn BillingStore>,
    interval: Duration,
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(store: Arc<dyn BillingStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one sweep. Returns how many plans were expired.
    pub async fn sweep_once(&self) -> u64 {
        match self.store.expire_overdue(Utc::now()).await {
            Ok(0) => 0,
            Ok(count) => {
                tracing::info!(count, "Expired lapsed subscriptions");
                count
            }
            Err(e) => {
                tracing::error!(error = %e, "Expiry sweep failed");
                0
            }
        }
    }

    /// Spawn the sweep loop. The first sweep runs after one interval.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick fires immediately; skip it so startup is quiet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::accounts::{AccountStore, InMemoryAccountStore, NewAccount, PlanStatus, PlanTier};
    use crate::billing::{Activation, InMemoryBillingStore, NewCharge};

    #[tokio::test]
    async fn test_sweep_expires_lapsed_plans() {
        let accounts = InMemoryAccountStore::new();
        let account = accounts.create(NewAccount::default()).await.unwrap();
        let store = Arc::new(InMemoryBillingStore::new(accounts.clone()));

        store
            .create_charge(NewCharge {
                order_id: "order_1".to_string(),
                account_id: account.id,
                tier: PlanTier::Resident,
                plan_name: "EcoVerse Resident".to_string(),
                amount: 99_900,
                currency: "INR".to_string(),
            })
            .await
            .unwrap();
        store
            .activate(Activation {
                order_id: "order_1".to_string(),
                account_id: account.id,
                payment_id: "pay_1".to_string(),
                signature: "sig".to_string(),
                starts_at: Utc::now() - ChronoDuration::days(40),
                ends_at: Utc::now() - ChronoDuration::days(9),
            })
            .await
            .unwrap();

        let sweeper = ExpirySweeper::new(store, Duration::from_secs(3600));
        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(sweeper.sweep_once().await, 0);

        let account = accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.plan_status, PlanStatus::Expired);
        assert!(!account.has_active_plan());
    }
}
