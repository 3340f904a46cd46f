//! HTTP routes.
//!
//! Everything under `/api` except the auth endpoints, the public plan
//! listing, and the webhook receiver sits behind the bearer-token gate.

pub mod account;
pub mod auth;
pub mod billing;
pub mod bookings;
pub mod ledger;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::auth::require_auth;
use crate::http::ApiResponse;

pub fn router(ctx: AppContext) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/otp/request", post(auth::otp_request))
        .route("/api/auth/otp/verify", post(auth::otp_verify))
        .route("/api/auth/google", post(auth::google))
        .route("/api/plans", get(billing::plans))
        .route("/api/webhooks/gateway", post(billing::webhook));

    let protected = Router::new()
        .route(
            "/api/account",
            get(account::me).put(account::update).delete(account::delete),
        )
        .route("/api/subscriptions/checkout", post(billing::checkout))
        .route("/api/subscriptions/activate", post(billing::activate))
        .route("/api/subscriptions/cancel", post(billing::cancel))
        .route("/api/coins/balance", get(ledger::balance))
        .route("/api/coins/history", get(ledger::history))
        .route("/api/coins/spend", post(ledger::spend))
        .route("/api/coins/add", post(ledger::add))
        .route("/api/coins/signup-bonus", post(ledger::signup_bonus))
        .route("/api/bookings", post(bookings::create).get(bookings::list))
        .route("/api/bookings/{id}/cancel", post(bookings::cancel))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn health() -> ApiResponse<serde_json::Value> {
    ApiResponse::success(serde_json::json!({ "status": "ok" }))
}
