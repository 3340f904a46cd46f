//! Payment activation: the client returns from the gateway widget with a
//! payment id and signature, and this turns the pending charge into an
//! active subscription.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::signature::verify_payment_signature;
use super::storage::{Activation, BillingStore, PlanRecord};
use crate::accounts::{AccountStore, PlanTier};
use crate::config::GatewayConfig;
use crate::email::Mailer;
use crate::error::{ApiError, Result};

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    /// Tier the client believes it paid for; cross-checked against the
    /// stored charge.
    pub tier: String,
}

/// Verifies payment proofs and activates plans.
#[derive(Clone)]
pub struct ActivationManager {
    store: Arc<dyn BillingStore>,
    accounts: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    key_secret: secrecy::SecretString,
}

impl ActivationManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn BillingStore>,
        accounts: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        gateway: &GatewayConfig,
    ) -> Self {
        Self {
            store,
            accounts,
            mailer,
            key_secret: gateway.key_secret.clone(),
        }
    }

    /// Activate the plan purchased under `order_id`.
    ///
    /// The tier and signature are checked before anything is written, so a
    /// forged or tampered request leaves no trace beyond a log line. Replays
    /// of an already-processed order are rejected by the store.
    pub async fn activate(&self, account_id: Uuid, request: ActivateRequest) -> Result<PlanRecord> {
        let tier = PlanTier::parse(&request.tier)
            .ok_or_else(|| ApiError::bad_request("Unknown plan tier"))?;

        let charge = self
            .store
            .get_charge(&request.order_id)
            .await?
            .ok_or_else(|| ApiError::bad_request("Unknown order"))?;

        if charge.account_id != account_id {
            return Err(ApiError::forbidden("Order does not belong to this account"));
        }
        if charge.tier != tier {
            return Err(ApiError::bad_request("Plan tier does not match order"));
        }

        if !verify_payment_signature(
            &self.key_secret,
            &request.order_id,
            &request.payment_id,
            &request.signature,
        ) {
            tracing::warn!(
                account_id = %account_id,
                order_id = %request.order_id,
                "Payment signature verification failed"
            );
            return Err(ApiError::bad_request("Invalid payment signature"));
        }

        let starts_at = Utc::now();
        let ends_at = plan_period_end(starts_at)?;

        let record = self
            .store
            .activate(Activation {
                order_id: request.order_id,
                account_id,
                payment_id: request.payment_id,
                signature: request.signature,
                starts_at,
                ends_at,
            })
            .await?;

        tracing::info!(
            account_id = %account_id,
            order_id = %record.order_id,
            plan = %record.tier,
            ends_at = %record.ends_at,
            "Plan activated"
        );

        self.send_confirmation(&record).await;

        Ok(record)
    }

    /// Cancel the account's active plan.
    pub async fn cancel(&self, account_id: Uuid) -> Result<()> {
        if !self.store.cancel_active_plan(account_id).await? {
            return Err(ApiError::bad_request("No active plan to cancel"));
        }
        tracing::info!(account_id = %account_id, "Plan cancelled");
        Ok(())
    }

    /// Best-effort confirmation email; a delivery failure never fails the
    /// activation itself.
    async fn send_confirmation(&self, record: &PlanRecord) {
        let email = match self.accounts.find_by_id(record.account_id).await {
            Ok(Some(account)) => account.email,
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(account_id = %record.account_id, error = %e, "Account lookup for confirmation email failed");
                None
            }
        };
        let Some(email) = email else { return };

        if let Err(e) = self
            .mailer
            .send(
                &email,
                "Your ErthaLoka plan is active",
                &format!(
                    "Your {} plan is active until {}.",
                    record.plan_name,
                    record.ends_at.format("%Y-%m-%d")
                ),
            )
            .await
        {
            tracing::warn!(account_id = %record.account_id, error = %e, "Activation email failed");
        }
    }
}

/// One calendar month from `starts_at`, clamped to the last day of the
/// shorter month (Jan 31 + 1 month = Feb 28/29).
pub fn plan_period_end(starts_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
    starts_at
        .checked_add_months(Months::new(1))
        .ok_or_else(|| ApiError::internal("Plan end date out of range"))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone};
    use secrecy::SecretString;

    use super::*;
    use crate::accounts::{InMemoryAccountStore, NewAccount};
    use crate::billing::signature::payment_signature;
    use crate::billing::storage::{ChargeStatus, InMemoryBillingStore, NewCharge};
    use crate::email::test::RecordingMailer;

    fn gateway_config() -> GatewayConfig {
        GatewayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: SecretString::from("test-key-secret".to_string()),
            webhook_secret: SecretString::from("test-webhook-secret".to_string()),
            api_base: "http://localhost".to_string(),
        }
    }

    struct Setup {
        accounts: InMemoryAccountStore,
        store: Arc<InMemoryBillingStore>,
        mailer: RecordingMailer,
        manager: ActivationManager,
        account_id: Uuid,
    }

    async fn setup() -> Setup {
        let accounts = InMemoryAccountStore::new();
        let account = accounts
            .create(NewAccount {
                email: Some("member@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
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
        let mailer = RecordingMailer::new();
        let manager = ActivationManager::new(
            store.clone(),
            Arc::new(accounts.clone()),
            Arc::new(mailer.clone()),
            &gateway_config(),
        );
        Setup {
            accounts,
            store,
            mailer,
            manager,
            account_id: account.id,
        }
    }

    fn signed_request(order_id: &str, payment_id: &str) -> ActivateRequest {
        let secret = SecretString::from("test-key-secret".to_string());
        ActivateRequest {
            order_id: order_id.to_string(),
            payment_id: payment_id.to_string(),
            signature: payment_signature(&secret, order_id, payment_id),
            tier: "resident".to_string(),
        }
    }

    #[tokio::test]
    async fn test_activate_success_and_confirmation_email() {
        let test = setup().await;

        let record = test
            .manager
            .activate(test.account_id, signed_request("order_1", "pay_1"))
            .await
            .unwrap();
        assert_eq!(record.tier, PlanTier::Resident);

        let account = test
            .accounts
            .find_by_id(test.account_id)
            .await
            .unwrap()
            .unwrap();
        assert!(account.has_active_plan());

        let sent = test.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "member@example.com");
        assert_eq!(sent[0].1, "Your ErthaLoka plan is active");
    }

    #[tokio::test]
    async fn test_tampered_signature_leaves_no_side_effects() {
        let test = setup().await;

        let mut request = signed_request("order_1", "pay_1");
        request.signature = "0".repeat(64);

        let err = test
            .manager
            .activate(test.account_id, request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid payment signature"));

        // Charge untouched, no plan record, account still planless.
        let charge = test.store.get_charge("order_1").await.unwrap().unwrap();
        assert_eq!(charge.status, ChargeStatus::Pending);
        assert!(test
            .store
            .plan_history(test.account_id)
            .await
            .unwrap()
            .is_empty());
        let account = test
            .accounts
            .find_by_id(test.account_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!account.has_active_plan());
        assert!(test.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tier_leaves_no_side_effects() {
        let test = setup().await;

        let mut request = signed_request("order_1", "pay_1");
        request.tier = "platinum".to_string();

        let err = test
            .manager
            .activate(test.account_id, request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown plan tier"));

        let charge = test.store.get_charge("order_1").await.unwrap().unwrap();
        assert_eq!(charge.status, ChargeStatus::Pending);
        assert!(test
            .store
            .plan_history(test.account_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_tier_rejected() {
        let test = setup().await;

        // The charge is for resident.
        let mut request = signed_request("order_1", "pay_1");
        request.tier = "guardian".to_string();

        let err = test
            .manager
            .activate(test.account_id, request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match order"));
        let charge = test.store.get_charge("order_1").await.unwrap().unwrap();
        assert_eq!(charge.status, ChargeStatus::Pending);
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let test = setup().await;

        test.manager
            .activate(test.account_id, signed_request("order_1", "pay_1"))
            .await
            .unwrap();
        let err = test
            .manager
            .activate(test.account_id, signed_request("order_1", "pay_1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already processed"));
        assert_eq!(
            test.store.plan_history(test.account_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_foreign_order_rejected() {
        let test = setup().await;

        let err = test
            .manager
            .activate(Uuid::new_v4(), signed_request("order_1", "pay_1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not belong"));
    }

    #[tokio::test]
    async fn test_unknown_order_rejected() {
        let test = setup().await;

        let err = test
            .manager
            .activate(test.account_id, signed_request("order_missing", "pay_1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown order"));
    }

    #[tokio::test]
    async fn test_cancel_without_plan_rejected() {
        let test = setup().await;

        let err = test.manager.cancel(test.account_id).await.unwrap_err();
        assert!(err.to_string().contains("No active plan"));
    }

    #[test]
    fn test_period_end_clamps_to_month_end() {
        let jan31 = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        let end = plan_period_end(jan31).unwrap();
        assert_eq!(end.month(), 2);
        assert_eq!(end.day(), 28);

        let mar15 = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let end = plan_period_end(mar15).unwrap();
        assert_eq!(end.month(), 4);
        assert_eq!(end.day(), 15);
    }
}
