//! Test support: fixed-secret services and a fully in-memory [`AppContext`].
//!
//! Unit tests use the individual helpers; integration tests build a
//! [`TestContext`] and drive the router end to end without Postgres or any
//! live provider.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::accounts::InMemoryAccountStore;
use crate::app::AppContext;
use crate::auth::flows::google::test::MockGoogleVerifier;
use crate::auth::flows::google::VerifiedIdentity;
use crate::auth::{
    GoogleFlow, InMemoryOtpStore, LoginFlow, OtpFlow, PasswordConfig, PasswordHasher, RegisterFlow,
    TokenService,
};
use crate::billing::checkout::test::MockGatewayClient;
use crate::billing::{
    ActivationManager, CheckoutManager, InMemoryBillingStore, PlanCatalog, WebhookHandler,
};
use crate::bookings::{BookingManager, InMemoryBookingStore};
use crate::config::{AuthConfig, GatewayConfig};
use crate::email::ConsoleMailer;
use crate::ledger::{InMemoryLedgerStore, LedgerManager};
use crate::sms::test::RecordingSmsSender;

/// Shared secret for payment signatures in tests.
pub const TEST_KEY_SECRET: &str = "test-key-secret";

/// Shared secret for webhook signatures in tests.
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

/// ID token the mock Google verifier accepts.
pub const TEST_GOOGLE_TOKEN: &str = "good-token";

/// Token service with a fixed secret and a one-hour lifetime.
#[must_use]
pub fn test_token_service() -> TokenService {
    TokenService::new(&AuthConfig {
        jwt_secret: SecretString::from("test-secret-key-32-bytes-long!!".to_string()),
        issuer: "erthaloka-test".to_string(),
        token_ttl: Duration::from_secs(3600),
        google_client_id: None,
    })
}

/// Gateway configuration with the fixed test secrets.
#[must_use]
pub fn test_gateway_config() -> GatewayConfig {
    GatewayConfig {
        key_id: "rzp_test_key".to_string(),
        key_secret: SecretString::from(TEST_KEY_SECRET.to_string()),
        webhook_secret: SecretString::from(TEST_WEBHOOK_SECRET.to_string()),
        api_base: "http://localhost".to_string(),
    }
}

/// Sign `order_id`/`payment_id` the way the gateway would in tests.
#[must_use]
pub fn sign_payment(order_id: &str, payment_id: &str) -> String {
    let secret = SecretString::from(TEST_KEY_SECRET.to_string());
    crate::billing::signature::payment_signature(&secret, order_id, payment_id)
}

/// Sign a webhook body the way the gateway would in tests.
#[must_use]
pub fn sign_webhook(body: &[u8]) -> String {
    let secret = SecretString::from(TEST_WEBHOOK_SECRET.to_string());
    crate::billing::signature::webhook_signature(&secret, body)
}

/// An [`AppContext`] over in-memory stores and mock providers, with handles
/// to the pieces tests assert against.
pub struct TestContext {
    pub ctx: AppContext,
    pub accounts: InMemoryAccountStore,
    pub billing: Arc<InMemoryBillingStore>,
    pub sms: RecordingSmsSender,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let accounts = InMemoryAccountStore::new();
        let accounts_dyn: Arc<dyn crate::accounts::AccountStore> = Arc::new(accounts.clone());
        let billing = Arc::new(InMemoryBillingStore::new(accounts.clone()));
        let billing_dyn: Arc<dyn crate::billing::BillingStore> = billing.clone();

        let tokens = test_token_service();
        let hasher = PasswordHasher::new(PasswordConfig::fast());
        let ledger = LedgerManager::new(Arc::new(InMemoryLedgerStore::new(accounts.clone())));
        let catalog = PlanCatalog::new();
        let gateway = test_gateway_config();
        let sms = RecordingSmsSender::new();

        let register = RegisterFlow::new(
            accounts_dyn.clone(),
            hasher.clone(),
            tokens.clone(),
            ledger.clone(),
            Arc::new(ConsoleMailer),
        );
        let login = LoginFlow::new(accounts_dyn.clone(), hasher, tokens.clone());
        let otp = OtpFlow::new(
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(sms.clone()),
            accounts_dyn.clone(),
            tokens.clone(),
            ledger.clone(),
        );
        let google = GoogleFlow::new(
            Arc::new(MockGoogleVerifier {
                expected_token: TEST_GOOGLE_TOKEN.to_string(),
                identity: VerifiedIdentity {
                    subject: "goog-test-subject".to_string(),
                    email: Some("google-member@example.com".to_string()),
                    name: Some("Google Member".to_string()),
                },
            }),
            accounts_dyn.clone(),
            tokens.clone(),
            ledger.clone(),
        );

        let checkout = CheckoutManager::new(
            Arc::new(MockGatewayClient::new()),
            billing_dyn.clone(),
            catalog.clone(),
            gateway.key_id.clone(),
        );
        let activation = ActivationManager::new(
            billing_dyn.clone(),
            accounts_dyn.clone(),
            Arc::new(ConsoleMailer),
            &gateway,
        );
        let webhook = WebhookHandler::new(billing_dyn.clone(), &gateway);
        let bookings = BookingManager::new(Arc::new(InMemoryBookingStore::new()));

        let ctx = AppContext {
            accounts: accounts_dyn,
            billing: billing_dyn,
            tokens,
            register,
            login,
            otp,
            google,
            catalog,
            checkout,
            activation,
            webhook,
            ledger,
            bookings,
        };

        Self {
            ctx,
            accounts,
            billing,
            sms,
        }
    }

    /// The router over this context.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        self.ctx.clone().router()
    }
}
