//! Gateway webhook handling.
//!
//! The gateway delivers events signed with the webhook secret. Deliveries
//! are verified against the raw body, deduplicated by event id, and then
//! applied. `payment.captured` is a backup activation path for clients that
//! never came back from the payment widget.

use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;

use super::activation::plan_period_end;
use super::signature::{payment_signature, verify_webhook_signature};
use super::storage::{Activation, BillingStore, ChargeStatus};
use crate::config::GatewayConfig;
use crate::error::{ApiError, Result};

/// Signature header set by the gateway on each delivery.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    /// Unique delivery id, used for deduplication.
    id: String,
    event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    order_id: Option<String>,
    payment_id: Option<String>,
}

/// What handling a delivery amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event was applied.
    Processed,
    /// The event id was seen before; nothing was applied.
    AlreadyProcessed,
    /// Valid delivery, but nothing to do (unknown event type, unknown
    /// order, or a charge that already settled).
    Ignored,
}

/// Verifies and applies gateway webhook deliveries.
#[derive(Clone)]
pub struct WebhookHandler {
    store: Arc<dyn BillingStore>,
    webhook_secret: SecretString,
    key_secret: SecretString,
}

impl WebhookHandler {
    #[must_use]
    pub fn new(store: Arc<dyn BillingStore>, gateway: &GatewayConfig) -> Self {
        Self {
            store,
            webhook_secret: gateway.webhook_secret.clone(),
            key_secret: gateway.key_secret.clone(),
        }
    }

    /// Handle one delivery: raw body plus the value of
    /// [`SIGNATURE_HEADER`].
    pub async fn handle(&self, body: &[u8], signature: &str) -> Result<WebhookOutcome> {
        if !verify_webhook_signature(&self.webhook_secret, body, signature) {
            tracing::warn!("Webhook signature verification failed");
            return Err(ApiError::unauthorized("Invalid webhook signature"));
        }

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|_| ApiError::bad_request("Malformed webhook body"))?;

        if self.store.is_event_processed(&event.id).await? {
            tracing::info!(event_id = %event.id, "Webhook replay ignored");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let outcome = match event.event.as_str() {
            "payment.captured" => self.on_payment_captured(&event).await?,
            "payment.failed" => self.on_payment_failed(&event).await?,
            "subscription.cancelled" => self.on_subscription_cancelled(&event).await?,
            other => {
                tracing::debug!(event = other, "Unhandled webhook event type");
                WebhookOutcome::Ignored
            }
        };

        // Marked only now, so a delivery whose handling failed stays
        // unrecorded and the gateway's retry is not answered as a replay.
        self.store.mark_event_processed(&event.id).await?;

        tracing::info!(event_id = %event.id, event = %event.event, ?outcome, "Webhook handled");
        Ok(outcome)
    }

    /// Activate the plan for a captured payment, unless the client-side
    /// activation already did.
    async fn on_payment_captured(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let (Some(order_id), Some(payment_id)) =
            (event.payload.order_id.as_deref(), event.payload.payment_id.as_deref())
        else {
            return Err(ApiError::bad_request("Missing payment details"));
        };

        let Some(charge) = self.store.get_charge(order_id).await? else {
            tracing::warn!(order_id, "Webhook for unknown order");
            return Ok(WebhookOutcome::Ignored);
        };
        if charge.status != ChargeStatus::Pending {
            return Ok(WebhookOutcome::Ignored);
        }

        let starts_at = Utc::now();
        self.store
            .activate(Activation {
                order_id: order_id.to_string(),
                account_id: charge.account_id,
                payment_id: payment_id.to_string(),
                signature: payment_signature(&self.key_secret, order_id, payment_id),
                starts_at,
                ends_at: plan_period_end(starts_at)?,
            })
            .await?;

        Ok(WebhookOutcome::Processed)
    }

    async fn on_payment_failed(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let Some(order_id) = event.payload.order_id.as_deref() else {
            return Err(ApiError::bad_request("Missing payment details"));
        };

        if self.store.mark_charge_failed(order_id).await? {
            Ok(WebhookOutcome::Processed)
        } else {
            Ok(WebhookOutcome::Ignored)
        }
    }

    /// A gateway-side cancellation: resolve the order to its account and
    /// cancel the active plan locally.
    async fn on_subscription_cancelled(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let Some(order_id) = event.payload.order_id.as_deref() else {
            return Err(ApiError::bad_request("Missing payment details"));
        };

        let Some(charge) = self.store.get_charge(order_id).await? else {
            tracing::warn!(order_id, "Webhook for unknown order");
            return Ok(WebhookOutcome::Ignored);
        };

        if self.store.cancel_active_plan(charge.account_id).await? {
            Ok(WebhookOutcome::Processed)
        } else {
            Ok(WebhookOutcome::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use uuid::Uuid;

    use super::*;
    use crate::accounts::{AccountStore, InMemoryAccountStore, NewAccount, PlanStatus, PlanTier};
    use crate::billing::signature::webhook_signature;
    use crate::billing::storage::{InMemoryBillingStore, NewCharge};

    fn gateway_config() -> GatewayConfig {
        GatewayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: SecretString::from("test-key-secret".to_string()),
            webhook_secret: SecretString::from("test-webhook-secret".to_string()),
            api_base: "http://localhost".to_string(),
        }
    }

    async fn setup() -> (InMemoryAccountStore, Arc<InMemoryBillingStore>, Uuid, WebhookHandler) {
        let accounts = InMemoryAccountStore::new();
        let account = accounts.create(NewAccount::default()).await.unwrap();
        let store = Arc::new(InMemoryBillingStore::new(accounts.clone()));
        store
            .create_charge(NewCharge {
                order_id: "order_1".to_string(),
                account_id: account.id,
                tier: PlanTier::Guardian,
                plan_name: "EcoVerse Guardian".to_string(),
                amount: 499_900,
                currency: "INR".to_string(),
            })
            .await
            .unwrap();
        let handler = WebhookHandler::new(store.clone(), &gateway_config());
        (accounts, store, account.id, handler)
    }

    fn signed(body: &str) -> (Vec<u8>, String) {
        let secret = SecretString::from("test-webhook-secret".to_string());
        let sig = webhook_signature(&secret, body.as_bytes());
        (body.as_bytes().to_vec(), sig)
    }

    fn captured_event(event_id: &str) -> String {
        format!(
            r#"{{"id":"{event_id}","event":"payment.captured","payload":{{"order_id":"order_1","payment_id":"pay_1"}}}}"#
        )
    }

    #[tokio::test]
    async fn test_captured_event_activates_plan() {
        let (accounts, _, account_id, handler) = setup().await;

        let (body, sig) = signed(&captured_event("evt_1"));
        let outcome = handler.handle(&body, &sig).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        let account = accounts.find_by_id(account_id).await.unwrap().unwrap();
        assert!(account.has_active_plan());
        assert_eq!(account.plan_tier, Some(PlanTier::Guardian));
    }

    #[tokio::test]
    async fn test_replayed_delivery_applied_once() {
        let (_, store, account_id, handler) = setup().await;

        let (body, sig) = signed(&captured_event("evt_1"));
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::Processed
        );
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::AlreadyProcessed
        );
        assert_eq!(store.plan_history(account_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let (_, store, account_id, handler) = setup().await;

        let body = captured_event("evt_1");
        let err = handler
            .handle(body.as_bytes(), "not-the-signature")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid webhook signature"));
        assert!(store.plan_history(account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_event_cancels_plan() {
        let (accounts, _, account_id, handler) = setup().await;

        let (body, sig) = signed(&captured_event("evt_1"));
        handler.handle(&body, &sig).await.unwrap();

        let (body, sig) = signed(
            r#"{"id":"evt_2","event":"subscription.cancelled","payload":{"order_id":"order_1"}}"#,
        );
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::Processed
        );

        let account = accounts.find_by_id(account_id).await.unwrap().unwrap();
        assert!(!account.has_active_plan());
        assert_eq!(account.plan_status, PlanStatus::Cancelled);

        // A second cancellation has nothing left to act on.
        let (body, sig) = signed(
            r#"{"id":"evt_3","event":"subscription.cancelled","payload":{"order_id":"order_1"}}"#,
        );
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_failed_handling_leaves_event_retryable() {
        let (accounts, _, account_id, handler) = setup().await;

        // A broken payload makes the handler fail; the event id must not be
        // burned by that attempt.
        let (body, sig) = signed(
            r#"{"id":"evt_1","event":"payment.captured","payload":{"order_id":"order_1"}}"#,
        );
        assert!(handler.handle(&body, &sig).await.is_err());

        // The gateway retries the delivery under the same id.
        let (body, sig) = signed(&captured_event("evt_1"));
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::Processed
        );
        let account = accounts.find_by_id(account_id).await.unwrap().unwrap();
        assert!(account.has_active_plan());
    }

    #[tokio::test]
    async fn test_failed_event_marks_charge() {
        let (_, store, _, handler) = setup().await;

        let (body, sig) = signed(
            r#"{"id":"evt_2","event":"payment.failed","payload":{"order_id":"order_1"}}"#,
        );
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::Processed
        );
        let charge = store.get_charge("order_1").await.unwrap().unwrap();
        assert_eq!(charge.status, ChargeStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_event_type_ignored() {
        let (_, _, _, handler) = setup().await;
        let (body, sig) = signed(r#"{"id":"evt_3","event":"refund.created","payload":{}}"#);
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_unknown_order_ignored() {
        let (_, _, _, handler) = setup().await;
        let (body, sig) = signed(
            r#"{"id":"evt_4","event":"payment.captured","payload":{"order_id":"order_x","payment_id":"pay_x"}}"#,
        );
        assert_eq!(
            handler.handle(&body, &sig).await.unwrap(),
            WebhookOutcome::Ignored
        );
    }
}
