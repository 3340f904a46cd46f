//! Google sign-in.
//!
//! The client obtains an ID token from Google and posts it here; we verify it
//! against Google's tokeninfo endpoint and resolve it to an account, creating
//! one on first sign-in.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::AuthResponse;
use crate::accounts::{AccountStore, NewAccount};
use crate::auth::jwt::TokenService;
use crate::error::{ApiError, Result};
use crate::ledger::LedgerManager;

#[derive(Debug, Deserialize)]
pub struct GoogleSignInRequest {
    pub id_token: String,
}

/// The identity asserted by a verified Google ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Google's stable subject identifier.
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Verifies a Google-issued ID token and returns the asserted identity.
#[async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity>;
}

/// Verifier backed by Google's tokeninfo endpoint.
pub struct LiveGoogleVerifier {
    http: reqwest::Client,
    endpoint: String,
    /// Expected audience; when set, tokens minted for other OAuth clients are
    /// rejected.
    client_id: Option<String>,
}

impl LiveGoogleVerifier {
    #[must_use]
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            client_id,
        }
    }
}

#[derive(Deserialize)]
struct TokenInfo {
    sub: String,
    aud: String,
    email: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl GoogleTokenVerifier for LiveGoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::unauthorized("Google token verification failed"));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|_| ApiError::unauthorized("Google token verification failed"))?;

        if let Some(expected) = &self.client_id {
            if &info.aud != expected {
                return Err(ApiError::unauthorized("Google token verification failed"));
            }
        }

        Ok(VerifiedIdentity {
            subject: info.sub,
            email: info.email,
            name: info.name,
        })
    }
}

/// Google sign-in flow: verify the token, find or create the account, issue
/// an access token.
#[derive(Clone)]
pub struct GoogleFlow {
    verifier: Arc<dyn GoogleTokenVerifier>,
    accounts: Arc<dyn AccountStore>,
    tokens: TokenService,
    ledger: LedgerManager,
}

impl GoogleFlow {
    #[must_use]
    pub fn new(
        verifier: Arc<dyn GoogleTokenVerifier>,
        accounts: Arc<dyn AccountStore>,
        tokens: TokenService,
        ledger: LedgerManager,
    ) -> Self {
        Self {
            verifier,
            accounts,
            tokens,
            ledger,
        }
    }

    pub async fn sign_in(&self, request: GoogleSignInRequest) -> Result<AuthResponse> {
        let identity = self.verifier.verify(&request.id_token).await?;

        let account = match self.accounts.find_by_google_sub(&identity.subject).await? {
            Some(account) => account,
            None => {
                let account = self
                    .accounts
                    .create(NewAccount {
                        email: identity.email,
                        google_sub: Some(identity.subject),
                        name: identity.name,
                        ..Default::default()
                    })
                    .await?;
                if let Err(e) = self.ledger.claim_signup_bonus(account.id).await {
                    tracing::warn!(account_id = %account.id, error = %e, "Signup bonus credit failed");
                }
                // Re-read so the response carries the post-bonus balance.
                self.accounts
                    .find_by_id(account.id)
                    .await?
                    .ok_or_else(|| ApiError::internal("Account vanished after create"))?
            }
        };

        let token = self.tokens.issue(account.id)?;
        Ok(AuthResponse { account, token })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use super::*;

    /// Verifier that accepts a fixed token string.
    pub struct MockGoogleVerifier {
        pub expected_token: String,
        pub identity: VerifiedIdentity,
    }

    #[async_trait]
    impl GoogleTokenVerifier for MockGoogleVerifier {
        async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity> {
            if id_token == self.expected_token {
                Ok(self.identity.clone())
            } else {
                Err(ApiError::unauthorized("Google token verification failed"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test::MockGoogleVerifier;
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::ledger::{InMemoryLedgerStore, LedgerManager};
    use crate::testing::test_token_service;

    fn flow(accounts: InMemoryAccountStore) -> GoogleFlow {
        let ledger = LedgerManager::new(Arc::new(InMemoryLedgerStore::new(accounts.clone())));
        GoogleFlow::new(
            Arc::new(MockGoogleVerifier {
                expected_token: "good-token".to_string(),
                identity: VerifiedIdentity {
                    subject: "goog-123".to_string(),
                    email: Some("member@gmail.com".to_string()),
                    name: Some("Member".to_string()),
                },
            }),
            Arc::new(accounts),
            test_token_service(),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_first_sign_in_creates_account() {
        let accounts = InMemoryAccountStore::new();
        let flow = flow(accounts.clone());

        let response = flow
            .sign_in(GoogleSignInRequest {
                id_token: "good-token".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.account.google_sub.as_deref(), Some("goog-123"));
        assert_eq!(response.account.email.as_deref(), Some("member@gmail.com"));
    }

    #[tokio::test]
    async fn test_second_sign_in_reuses_account() {
        let accounts = InMemoryAccountStore::new();
        let flow = flow(accounts.clone());

        let request = || GoogleSignInRequest {
            id_token: "good-token".to_string(),
        };
        let first = flow.sign_in(request()).await.unwrap();
        let second = flow.sign_in(request()).await.unwrap();
        assert_eq!(first.account.id, second.account.id);
    }

    #[tokio::test]
    async fn test_bad_token_rejected() {
        let flow = flow(InMemoryAccountStore::new());
        assert!(flow
            .sign_in(GoogleSignInRequest {
                id_token: "forged".to_string(),
            })
            .await
            .is_err());
    }
}
