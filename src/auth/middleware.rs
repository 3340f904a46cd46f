//! The authentication gate.
//!
//! Extracts a bearer token, validates it, resolves the subject to an account,
//! and attaches the account to request extensions. Failure modes are
//! distinguished: missing token and invalid/expired token answer 401, an
//! unknown subject answers 403.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::accounts::Account;
use crate::app::AppContext;
use crate::error::{ApiError, Result};

/// The authenticated account, available to handlers behind the gate via
/// `Extension<CurrentAccount>`.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

/// Middleware guarding authenticated routes.
pub async fn require_auth(
    State(ctx): State<AppContext>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&request)?;
    let claims = ctx.tokens.verify(&token)?;

    let account_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let account = ctx
        .accounts
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| ApiError::forbidden("Account no longer exists"))?;

    request.extensions_mut().insert(CurrentAccount(account));
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<String> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Malformed authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Malformed authorization header"))
}
