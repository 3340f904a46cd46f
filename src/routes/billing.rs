//! Plan and subscription routes.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};

use crate::app::AppContext;
use crate::auth::CurrentAccount;
use crate::billing::webhook::SIGNATURE_HEADER;
use crate::billing::{
    ActivateRequest, CheckoutRequest, CheckoutSession, PlanConfig, PlanRecord, WebhookOutcome,
};
use crate::error::{ApiError, Result};
use crate::http::ApiResponse;

/// Public plan listing.
pub async fn plans(State(ctx): State<AppContext>) -> ApiResponse<Vec<PlanConfig>> {
    ApiResponse::success(ctx.catalog.all().to_vec())
}

pub async fn checkout(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(request): Json<CheckoutRequest>,
) -> Result<ApiResponse<CheckoutSession>> {
    let session = ctx.checkout.checkout(account.id, request).await?;
    Ok(ApiResponse::success(session))
}

pub async fn activate(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(request): Json<ActivateRequest>,
) -> Result<ApiResponse<PlanRecord>> {
    let record = ctx.activation.activate(account.id, request).await?;
    Ok(ApiResponse::success_with_message(record, "Plan activated"))
}

pub async fn cancel(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Result<ApiResponse<()>> {
    ctx.activation.cancel(account.id).await?;
    Ok(ApiResponse::<()>::message_only("Plan cancelled"))
}

/// Gateway webhook receiver. Unauthenticated; trust comes from the body
/// signature, which is verified against the raw bytes before parsing.
pub async fn webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<()>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing webhook signature"))?;

    let outcome = ctx.webhook.handle(&body, signature).await?;
    let message = match outcome {
        WebhookOutcome::Processed => "Event processed",
        WebhookOutcome::AlreadyProcessed => "Event already processed",
        WebhookOutcome::Ignored => "Event ignored",
    };
    Ok(ApiResponse::<()>::message_only(message))
}
