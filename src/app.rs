//! Application wiring.
//!
//! [`AppContext`] is the dependency-injection seam: every handler reaches
//! its collaborators through it, and tests build one over in-memory stores
//! and mock clients instead of Postgres and live providers.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::net::TcpListener;

use crate::accounts::{AccountStore, SeaOrmAccountStore};
use crate::auth::flows::google::LiveGoogleVerifier;
use crate::auth::{
    GoogleFlow, InMemoryOtpStore, LoginFlow, OtpFlow, PasswordConfig, PasswordHasher, RegisterFlow,
    TokenService,
};
use crate::billing::{
    ActivationManager, BillingStore, CheckoutManager, LiveGatewayClient, PlanCatalog,
    SeaOrmBillingStore, WebhookHandler,
};
use crate::bookings::{BookingManager, SeaOrmBookingStore};
use crate::config::Config;
use crate::email::{ConsoleMailer, Mailer, SmtpMailer};
use crate::error::{ApiError, Result};
use crate::ledger::{LedgerManager, SeaOrmLedgerStore};
use crate::routes;
use crate::sms::{ConsoleSmsSender, HttpSmsSender, SmsSender};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub accounts: Arc<dyn AccountStore>,
    pub billing: Arc<dyn BillingStore>,
    pub tokens: TokenService,
    pub register: RegisterFlow,
    pub login: LoginFlow,
    pub otp: OtpFlow,
    pub google: GoogleFlow,
    pub catalog: PlanCatalog,
    pub checkout: CheckoutManager,
    pub activation: ActivationManager,
    pub webhook: WebhookHandler,
    pub ledger: LedgerManager,
    pub bookings: BookingManager,
}

impl AppContext {
    /// Wire the production context: SeaORM stores over `db`, the live
    /// payment gateway and Google verifier, and SMTP/SMS delivery when
    /// configured (console fallback otherwise).
    pub fn from_database(config: &Config, db: DatabaseConnection) -> Result<Self> {
        let accounts: Arc<dyn AccountStore> = Arc::new(SeaOrmAccountStore::new(db.clone()));
        let billing: Arc<dyn BillingStore> = Arc::new(SeaOrmBillingStore::new(db.clone()));
        let tokens = TokenService::new(&config.auth);
        let hasher = PasswordHasher::new(PasswordConfig::default());
        let ledger = LedgerManager::new(Arc::new(SeaOrmLedgerStore::new(db.clone())));
        let catalog = PlanCatalog::new();

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => Arc::new(ConsoleMailer),
        };
        let sms: Arc<dyn SmsSender> = match &config.sms {
            Some(sms) => Arc::new(HttpSmsSender::new(sms)),
            None => Arc::new(ConsoleSmsSender),
        };

        let register = RegisterFlow::new(
            accounts.clone(),
            hasher.clone(),
            tokens.clone(),
            ledger.clone(),
            mailer.clone(),
        );
        let login = LoginFlow::new(accounts.clone(), hasher, tokens.clone());
        let otp = OtpFlow::new(
            Arc::new(InMemoryOtpStore::new()),
            sms,
            accounts.clone(),
            tokens.clone(),
            ledger.clone(),
        );
        let google = GoogleFlow::new(
            Arc::new(LiveGoogleVerifier::new(config.auth.google_client_id.clone())),
            accounts.clone(),
            tokens.clone(),
            ledger.clone(),
        );

        let checkout = CheckoutManager::new(
            Arc::new(LiveGatewayClient::new(&config.gateway)),
            billing.clone(),
            catalog.clone(),
            config.gateway.key_id.clone(),
        );
        let activation =
            ActivationManager::new(billing.clone(), accounts.clone(), mailer, &config.gateway);
        let webhook = WebhookHandler::new(billing.clone(), &config.gateway);

        let bookings = BookingManager::new(Arc::new(SeaOrmBookingStore::new(db)));

        Ok(Self {
            accounts,
            billing,
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
        })
    }

    /// Build the router over this context.
    #[must_use]
    pub fn router(self) -> axum::Router {
        routes::router(self)
    }
}

/// Serve the API until ctrl-c (or SIGTERM) arrives.
pub async fn serve(ctx: AppContext, config: &Config) -> Result<()> {
    let addr = config.server.addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(%addr, "ErthaLoka API listening");
    axum::serve(listener, ctx.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal(format!("Server error: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
