//! Carbon-coin routes. All behind the auth gate.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppContext;
use crate::auth::CurrentAccount;
use crate::error::Result;
use crate::http::ApiResponse;
use crate::ledger::LedgerEntry;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CoinRequest {
    pub amount: i64,
    pub reason: Option<String>,
}

pub async fn balance(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Result<ApiResponse<BalanceResponse>> {
    let balance = ctx.ledger.balance(account.id).await?;
    Ok(ApiResponse::success(BalanceResponse { balance }))
}

pub async fn history(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Query(params): Query<HistoryParams>,
) -> Result<ApiResponse<Vec<LedgerEntry>>> {
    let entries = ctx.ledger.history(account.id, params.limit).await?;
    Ok(ApiResponse::success(entries))
}

pub async fn spend(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(request): Json<CoinRequest>,
) -> Result<ApiResponse<LedgerEntry>> {
    let reason = request.reason.as_deref().unwrap_or("Coin spend");
    let entry = ctx.ledger.debit(account.id, request.amount, reason).await?;
    Ok(ApiResponse::success(entry))
}

pub async fn add(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(request): Json<CoinRequest>,
) -> Result<ApiResponse<LedgerEntry>> {
    let reason = request.reason.as_deref().unwrap_or("Coin grant");
    let entry = ctx
        .ledger
        .credit(account.id, request.amount, reason)
        .await?;
    Ok(ApiResponse::success(entry))
}

pub async fn signup_bonus(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Result<ApiResponse<LedgerEntry>> {
    let entry = ctx.ledger.claim_signup_bonus(account.id).await?;
    Ok(ApiResponse::success_with_message(
        entry,
        "Signup bonus credited",
    ))
}
