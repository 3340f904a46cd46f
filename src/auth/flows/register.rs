//! Email + password registration.

use std::sync::Arc;

use serde::Deserialize;

use super::AuthResponse;
use crate::accounts::{AccountStore, NewAccount};
use crate::auth::jwt::TokenService;
use crate::auth::password::PasswordHasher;
use crate::email::Mailer;
use crate::error::{ApiError, Result};
use crate::ledger::LedgerManager;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Registers new accounts with an email and password credential.
#[derive(Clone)]
pub struct RegisterFlow {
    accounts: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    ledger: LedgerManager,
    mailer: Arc<dyn Mailer>,
}

impl RegisterFlow {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        ledger: LedgerManager,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            accounts,
            hasher,
            tokens,
            ledger,
            mailer,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        if !email.contains('@') || email.len() < 3 {
            return Err(ApiError::bad_request("Invalid email address"));
        }
        if request.password.len() < 8 {
            return Err(ApiError::bad_request(
                "Password must be at least 8 characters",
            ));
        }

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(ApiError::bad_request("Email already registered"));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let account = self
            .accounts
            .create(NewAccount {
                email: Some(email.clone()),
                password_hash: Some(password_hash),
                name: request.name,
                ..Default::default()
            })
            .await?;

        // Welcome credit; a failure here should not lose the registration.
        if let Err(e) = self.ledger.claim_signup_bonus(account.id).await {
            tracing::warn!(account_id = %account.id, error = %e, "Signup bonus credit failed");
        }

        if let Err(e) = self
            .mailer
            .send(
                &email,
                "Welcome to ErthaLoka",
                "Your ErthaLoka account is ready. Explore plans and start earning carbon coins.",
            )
            .await
        {
            tracing::warn!(account_id = %account.id, error = %e, "Welcome email failed");
        }

        let token = self.tokens.issue(account.id)?;
        // Re-read so the response carries the post-bonus balance.
        let account = self
            .accounts
            .find_by_id(account.id)
            .await?
            .ok_or_else(|| ApiError::internal("Account vanished after create"))?;

        Ok(AuthResponse { account, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::auth::password::PasswordConfig;
    use crate::email::ConsoleMailer;
    use crate::ledger::InMemoryLedgerStore;
    use crate::testing::test_token_service;

    fn flow(accounts: InMemoryAccountStore) -> RegisterFlow {
        let ledger = LedgerManager::new(Arc::new(InMemoryLedgerStore::new(accounts.clone())));
        RegisterFlow::new(
            Arc::new(accounts),
            PasswordHasher::new(PasswordConfig::fast()),
            test_token_service(),
            ledger,
            Arc::new(ConsoleMailer),
        )
    }

    #[tokio::test]
    async fn test_register_creates_account_with_bonus() {
        let accounts = InMemoryAccountStore::new();
        let flow = flow(accounts.clone());

        let response = flow
            .register(RegisterRequest {
                email: "New@Example.com".to_string(),
                password: "long enough".to_string(),
                name: Some("New Member".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.account.email.as_deref(), Some("new@example.com"));
        assert_eq!(response.account.coin_balance, 50);
        assert!(!response.token.token.is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let accounts = InMemoryAccountStore::new();
        let flow = flow(accounts.clone());

        let request = || RegisterRequest {
            email: "dup@example.com".to_string(),
            password: "long enough".to_string(),
            name: None,
        };
        flow.register(request()).await.unwrap();

        let err = flow.register(request()).await.unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let flow = flow(InMemoryAccountStore::new());

        assert!(flow
            .register(RegisterRequest {
                email: "no-at-sign".to_string(),
                password: "long enough".to_string(),
                name: None,
            })
            .await
            .is_err());

        assert!(flow
            .register(RegisterRequest {
                email: "ok@example.com".to_string(),
                password: "short".to_string(),
                name: None,
            })
            .await
            .is_err());
    }
}
