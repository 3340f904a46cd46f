//! Billing storage: pending charges, plan records, and webhook event
//! deduplication.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::accounts::{PlanStatus, PlanTier};
use crate::error::{ApiError, Result};

/// Lifecycle of a gateway charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Completed,
    Failed,
}

impl ChargeStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A gateway order awaiting payment, created at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PendingCharge {
    /// Gateway order id; the primary key for charges.
    pub order_id: String,
    pub account_id: Uuid,
    pub tier: PlanTier,
    pub plan_name: String,
    pub amount: i64,
    pub currency: String,
    pub status: ChargeStatus,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for recording a fresh checkout order.
#[derive(Debug, Clone)]
pub struct NewCharge {
    pub order_id: String,
    pub account_id: Uuid,
    pub tier: PlanTier,
    pub plan_name: String,
    pub amount: i64,
    pub currency: String,
}

/// Status of a purchased subscription period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanRecordStatus {
    Active,
    Expired,
    Cancelled,
}

impl PlanRecordStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "expired" => Self::Expired,
            "cancelled" => Self::Cancelled,
            _ => Self::Active,
        }
    }
}

/// One purchased subscription period.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tier: PlanTier,
    pub plan_name: String,
    pub amount: i64,
    pub currency: String,
    pub status: PlanRecordStatus,
    pub order_id: String,
    pub payment_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Everything activation writes once the signature has been verified.
#[derive(Debug, Clone)]
pub struct Activation {
    pub order_id: String,
    pub account_id: Uuid,
    pub payment_id: String,
    pub signature: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Storage operations for billing.
///
/// `activate` is the critical one: it must transition the charge from
/// pending to completed, insert the plan record, and update the account's
/// plan fields as one atomic step, and must fail without side effects when
/// the charge has already been processed.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn create_charge(&self, new: NewCharge) -> Result<PendingCharge>;

    async fn get_charge(&self, order_id: &str) -> Result<Option<PendingCharge>>;

    /// Complete a pending charge and activate the purchased plan.
    ///
    /// Returns the new plan record. Fails with a client error when the
    /// charge does not exist or is no longer pending; a replayed activation
    /// therefore gets a deterministic rejection instead of a second plan.
    async fn activate(&self, activation: Activation) -> Result<PlanRecord>;

    /// Mark a pending charge failed. Returns false when the charge was not
    /// pending (completed charges are never demoted).
    async fn mark_charge_failed(&self, order_id: &str) -> Result<bool>;

    /// The account's current active plan record, if any.
    async fn get_active_plan_record(&self, account_id: Uuid) -> Result<Option<PlanRecord>>;

    /// Plan purchase history, most recent first.
    async fn plan_history(&self, account_id: Uuid) -> Result<Vec<PlanRecord>>;

    /// Cancel the account's active plan. Returns false when there was
    /// nothing to cancel. Also clears the account's plan status.
    async fn cancel_active_plan(&self, account_id: Uuid) -> Result<bool>;

    /// Expire every active plan record whose period has lapsed, updating the
    /// owning accounts as well. Returns how many plans were expired.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Whether a webhook event id has already been recorded. Replayed
    /// deliveries are detected with this before any handling runs.
    async fn is_event_processed(&self, event_id: &str) -> Result<bool>;

    /// Record a webhook event id, once its handling has succeeded. Returns
    /// false when the id was already recorded.
    async fn mark_event_processed(&self, event_id: &str) -> Result<bool>;
}

/// In-memory billing store for testing.
///
/// Holds a clone of the in-memory account store so plan activation updates
/// the same accounts the rest of the test sees.
pub mod in_memory {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, RwLock};

    use super::*;
    use crate::accounts::{AccountStore, InMemoryAccountStore};

    /// In-memory [`BillingStore`].
    #[derive(Clone)]
    pub struct InMemoryBillingStore {
        accounts: InMemoryAccountStore,
        charges: Arc<RwLock<HashMap<String, PendingCharge>>>,
        records: Arc<RwLock<Vec<PlanRecord>>>,
        events: Arc<RwLock<HashSet<String>>>,
    }

    impl InMemoryBillingStore {
        #[must_use]
        pub fn new(accounts: InMemoryAccountStore) -> Self {
            Self {
                accounts,
                charges: Arc::default(),
                records: Arc::default(),
                events: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl BillingStore for InMemoryBillingStore {
        async fn create_charge(&self, new: NewCharge) -> Result<PendingCharge> {
            let charge = PendingCharge {
                order_id: new.order_id,
                account_id: new.account_id,
                tier: new.tier,
                plan_name: new.plan_name,
                amount: new.amount,
                currency: new.currency,
                status: ChargeStatus::Pending,
                payment_id: None,
                signature: None,
                created_at: Utc::now(),
            };
            self.charges
                .write()
                .unwrap()
                .insert(charge.order_id.clone(), charge.clone());
            Ok(charge)
        }

        async fn get_charge(&self, order_id: &str) -> Result<Option<PendingCharge>> {
            Ok(self.charges.read().unwrap().get(order_id).cloned())
        }

        async fn activate(&self, activation: Activation) -> Result<PlanRecord> {
            // Charge transition and record insert under locks, then the
            // account update. Lock guards are dropped before the await.
            let record = {
                let mut charges = self.charges.write().unwrap();
                let charge = charges
                    .get_mut(&activation.order_id)
                    .ok_or_else(|| ApiError::bad_request("Unknown order"))?;
                if charge.status != ChargeStatus::Pending {
                    return Err(ApiError::bad_request("Payment already processed"));
                }
                charge.status = ChargeStatus::Completed;
                charge.payment_id = Some(activation.payment_id.clone());
                charge.signature = Some(activation.signature.clone());

                let record = PlanRecord {
                    id: Uuid::new_v4(),
                    account_id: activation.account_id,
                    tier: charge.tier,
                    plan_name: charge.plan_name.clone(),
                    amount: charge.amount,
                    currency: charge.currency.clone(),
                    status: PlanRecordStatus::Active,
                    order_id: activation.order_id.clone(),
                    payment_id: activation.payment_id.clone(),
                    starts_at: activation.starts_at,
                    ends_at: activation.ends_at,
                    created_at: Utc::now(),
                };
                self.records.write().unwrap().push(record.clone());
                record
            };

            self.accounts
                .set_plan(
                    record.account_id,
                    Some(record.tier),
                    PlanStatus::Active,
                    Some(record.starts_at),
                    Some(record.ends_at),
                )
                .await?;

            Ok(record)
        }

        async fn mark_charge_failed(&self, order_id: &str) -> Result<bool> {
            let mut charges = self.charges.write().unwrap();
            match charges.get_mut(order_id) {
                Some(charge) if charge.status == ChargeStatus::Pending => {
                    charge.status = ChargeStatus::Failed;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn get_active_plan_record(&self, account_id: Uuid) -> Result<Option<PlanRecord>> {
            Ok(self
                .records
                .read()
                .unwrap()
                .iter()
                .find(|r| r.account_id == account_id && r.status == PlanRecordStatus::Active)
                .cloned())
        }

        async fn plan_history(&self, account_id: Uuid) -> Result<Vec<PlanRecord>> {
            let mut history: Vec<PlanRecord> = self
                .records
                .read()
                .unwrap()
                .iter()
                .filter(|r| r.account_id == account_id)
                .cloned()
                .collect();
            history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(history)
        }

        async fn cancel_active_plan(&self, account_id: Uuid) -> Result<bool> {
            let cancelled = {
                let mut records = self.records.write().unwrap();
                match records
                    .iter_mut()
                    .find(|r| r.account_id == account_id && r.status == PlanRecordStatus::Active)
                {
                    Some(record) => {
                        record.status = PlanRecordStatus::Cancelled;
                        true
                    }
                    None => false,
                }
            };
            if cancelled {
                self.accounts
                    .set_plan(account_id, None, PlanStatus::Cancelled, None, None)
                    .await?;
            }
            Ok(cancelled)
        }

        async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
            let expired: Vec<Uuid> = {
                let mut records = self.records.write().unwrap();
                records
                    .iter_mut()
                    .filter(|r| r.status == PlanRecordStatus::Active && r.ends_at <= now)
                    .map(|r| {
                        r.status = PlanRecordStatus::Expired;
                        r.account_id
                    })
                    .collect()
            };
            for account_id in &expired {
                self.accounts
                    .set_plan(*account_id, None, PlanStatus::Expired, None, None)
                    .await?;
            }
            Ok(expired.len() as u64)
        }

        async fn is_event_processed(&self, event_id: &str) -> Result<bool> {
            Ok(self.events.read().unwrap().contains(event_id))
        }

        async fn mark_event_processed(&self, event_id: &str) -> Result<bool> {
            Ok(self.events.write().unwrap().insert(event_id.to_string()))
        }
    }
}

pub use in_memory::InMemoryBillingStore;
