//! Account profile routes. All behind the auth gate.

use axum::extract::State;
use axum::{Extension, Json};

use crate::accounts::{Account, ProfileUpdate};
use crate::app::AppContext;
use crate::auth::CurrentAccount;
use crate::error::Result;
use crate::http::ApiResponse;

pub async fn me(Extension(CurrentAccount(account)): Extension<CurrentAccount>) -> ApiResponse<Account> {
    ApiResponse::success(account)
}

pub async fn update(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(update): Json<ProfileUpdate>,
) -> Result<ApiResponse<Account>> {
    let updated = ctx.accounts.update_profile(account.id, update).await?;
    Ok(ApiResponse::success(updated))
}

pub async fn delete(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Result<ApiResponse<()>> {
    ctx.accounts.delete(account.id).await?;
    tracing::info!(account_id = %account.id, "Account deleted");
    Ok(ApiResponse::<()>::message_only("Account deleted"))
}
