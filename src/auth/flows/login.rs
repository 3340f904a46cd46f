//! Email + password login.

use std::sync::Arc;

use serde::Deserialize;

use super::AuthResponse;
use crate::accounts::AccountStore;
use crate::auth::jwt::TokenService;
use crate::auth::password::PasswordHasher;
use crate::error::{ApiError, Result};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Verifies an email + password credential and issues a token.
#[derive(Clone)]
pub struct LoginFlow {
    accounts: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl LoginFlow {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
    ) -> Self {
        Self {
            accounts,
            hasher,
            tokens,
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        // One generic message for every failure path, so the response does
        // not reveal whether the email is registered.
        let generic = || ApiError::unauthorized("Invalid email or password");

        let account = self
            .accounts
            .find_by_email(request.email.trim())
            .await?
            .ok_or_else(generic)?;

        let hash = account.password_hash.as_deref().ok_or_else(generic)?;
        if !self.hasher.verify(&request.password, hash)? {
            return Err(generic());
        }

        let token = self.tokens.issue(account.id)?;
        Ok(AuthResponse { account, token })
    }
}
