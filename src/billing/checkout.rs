//! Checkout: create a gateway order for a plan and hand the client what it
//! needs to open the payment widget.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::plans::PlanCatalog;
use super::storage::{BillingStore, NewCharge};
use crate::accounts::PlanTier;
use crate::config::GatewayConfig;
use crate::error::{ApiError, Result};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Tier selector, e.g. `"resident"`.
    pub plan: String,
}

/// What the client needs to open the gateway's payment widget.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub plan: PlanTier,
    pub plan_name: String,
    /// Public gateway key id for the client-side widget.
    pub key_id: String,
}

/// An order created at the payment gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Client for the payment gateway's order API.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Create an order for `amount` in the smallest currency unit.
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str)
        -> Result<GatewayOrder>;
}

/// Gateway client backed by the real HTTP API, authenticated with basic auth
/// over the key pair.
pub struct LiveGatewayClient {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

impl LiveGatewayClient {
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }
}

#[async_trait]
impl GatewayClient for LiveGatewayClient {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder> {
        let response = self
            .http
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, "Gateway order creation failed");
            return Err(ApiError::service_unavailable(
                "Payment gateway is unavailable",
            ));
        }

        Ok(response.json().await?)
    }
}

/// Creates checkout sessions: resolves the plan, creates the gateway order,
/// and records the pending charge.
#[derive(Clone)]
pub struct CheckoutManager {
    gateway: Arc<dyn GatewayClient>,
    store: Arc<dyn BillingStore>,
    catalog: PlanCatalog,
    key_id: String,
}

impl CheckoutManager {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        store: Arc<dyn BillingStore>,
        catalog: PlanCatalog,
        key_id: String,
    ) -> Self {
        Self {
            gateway,
            store,
            catalog,
            key_id,
        }
    }

    pub async fn checkout(
        &self,
        account_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession> {
        let tier = PlanTier::parse(&request.plan)
            .ok_or_else(|| ApiError::bad_request("Unknown plan tier"))?;
        let plan = self.catalog.get(tier);

        let receipt = format!("plan_{}_{}", tier.as_str(), Uuid::new_v4().simple());
        let order = self
            .gateway
            .create_order(plan.amount, plan.currency, &receipt)
            .await?;

        let charge = self
            .store
            .create_charge(NewCharge {
                order_id: order.id,
                account_id,
                tier,
                plan_name: plan.name.to_string(),
                amount: order.amount,
                currency: order.currency,
            })
            .await?;

        tracing::info!(
            account_id = %account_id,
            order_id = %charge.order_id,
            plan = %tier,
            amount = charge.amount,
            "Checkout session created"
        );

        Ok(CheckoutSession {
            order_id: charge.order_id,
            amount: charge.amount,
            currency: charge.currency,
            plan: tier,
            plan_name: charge.plan_name,
            key_id: self.key_id.clone(),
        })
    }
}

/// Mock gateway client for testing.
#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    /// Returns orders with sequential ids and never talks to the network.
    #[derive(Default)]
    pub struct MockGatewayClient {
        counter: AtomicU64,
    }

    impl MockGatewayClient {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl GatewayClient for MockGatewayClient {
        async fn create_order(
            &self,
            amount: i64,
            currency: &str,
            _receipt: &str,
        ) -> Result<GatewayOrder> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(GatewayOrder {
                id: format!("order_test_{n}"),
                amount,
                currency: currency.to_string(),
            })
        }
    }
}
