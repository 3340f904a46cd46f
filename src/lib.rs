//! ErthaLoka - membership and subscription platform API
//!
//! The backend for a regenerative-living community: member accounts with
//! three login paths (email+password, phone OTP, Google sign-in), paid
//! subscription tiers purchased through a payment gateway, a carbon-coin
//! ledger, and space bookings.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use erthaloka::{app, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> erthaloka::Result<()> {
//!     erthaloka::init_tracing();
//!
//!     let config = Config::from_env()?;
//!     let db = sea_orm::Database::connect(&config.database_url)
//!         .await
//!         .map_err(erthaloka::ApiError::from)?;
//!
//!     let ctx = app::AppContext::from_database(&config, db)?;
//!     app::serve(ctx, &config).await
//! }
//! ```

pub mod accounts;
pub mod app;
pub mod auth;
pub mod billing;
pub mod bookings;
pub mod config;
pub mod email;
mod error;
pub mod http;
pub mod jobs;
pub mod ledger;
pub mod routes;
pub mod sms;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use app::{serve, AppContext};
pub use config::Config;
pub use error::{ApiError, Result};
pub use http::ApiResponse;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with defaults driven by `RUST_LOG` and
/// `ERTHALOKA_LOG_JSON`. Call early in `main()`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("ERTHALOKA_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from loaded configuration.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
