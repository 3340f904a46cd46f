//! Phone + one-time-code login.
//!
//! Codes are six digits, single use, and expire after five minutes. Only a
//! SHA-256 hash of the code is stored.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::AuthResponse;
use crate::accounts::{AccountStore, NewAccount};
use crate::auth::jwt::TokenService;
use crate::error::{ApiError, Result};
use crate::ledger::LedgerManager;
use crate::sms::SmsSender;

const CODE_TTL_MINUTES: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: String,
    pub code: String,
}

/// Storage for pending one-time codes.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a code hash for a phone number, replacing any prior code.
    async fn store_code(
        &self,
        phone: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Consume a code: returns true and removes it when the hash matches and
    /// the code has not expired.
    async fn consume_code(&self, phone: &str, code_hash: &str) -> Result<bool>;
}

/// In-memory OTP store.
///
/// Codes are short-lived and per-instance, so process memory is an acceptable
/// home for them.
#[derive(Default, Clone)]
pub struct InMemoryOtpStore {
    inner: Arc<std::sync::RwLock<std::collections::HashMap<String, (String, DateTime<Utc>)>>>,
}

impl InMemoryOtpStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn store_code(
        &self,
        phone: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .write()
            .unwrap()
            .insert(phone.to_string(), (code_hash.to_string(), expires_at));
        Ok(())
    }

    async fn consume_code(&self, phone: &str, code_hash: &str) -> Result<bool> {
        let mut codes = self.inner.write().unwrap();
        match codes.get(phone) {
            Some((stored_hash, expires_at))
                if stored_hash == code_hash && *expires_at > Utc::now() =>
            {
                codes.remove(phone);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Phone login: request a code over SMS, then trade it for a token.
#[derive(Clone)]
pub struct OtpFlow {
    store: Arc<dyn OtpStore>,
    sms: Arc<dyn SmsSender>,
    accounts: Arc<dyn AccountStore>,
    tokens: TokenService,
    ledger: LedgerManager,
}

impl OtpFlow {
    #[must_use]
    pub fn new(
        store: Arc<dyn OtpStore>,
        sms: Arc<dyn SmsSender>,
        accounts: Arc<dyn AccountStore>,
        tokens: TokenService,
        ledger: LedgerManager,
    ) -> Self {
        Self {
            store,
            sms,
            accounts,
            tokens,
            ledger,
        }
    }

    /// Generate and send a code to the given phone number.
    pub async fn request_code(&self, request: OtpRequest) -> Result<()> {
        let phone = normalize_phone(&request.phone)?;

        let code = generate_code();
        self.store
            .store_code(
                &phone,
                &hash_code(&code),
                Utc::now() + Duration::minutes(CODE_TTL_MINUTES),
            )
            .await?;

        self.sms
            .send(
                &phone,
                &format!("Your ErthaLoka login code is {code}. It expires in {CODE_TTL_MINUTES} minutes."),
            )
            .await?;

        Ok(())
    }

    /// Verify a code; creates the account on first login for this phone.
    pub async fn verify_code(&self, request: OtpVerifyRequest) -> Result<AuthResponse> {
        let phone = normalize_phone(&request.phone)?;

        if !self
            .store
            .consume_code(&phone, &hash_code(request.code.trim()))
            .await?
        {
            return Err(ApiError::unauthorized("Invalid or expired code"));
        }

        let account = match self.accounts.find_by_phone(&phone).await? {
            Some(account) => account,
            None => {
                let account = self
                    .accounts
                    .create(NewAccount {
                        phone: Some(phone),
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

fn normalize_phone(raw: &str) -> Result<String> {
    let phone: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = phone.strip_prefix('+').unwrap_or(&phone);
    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("Invalid phone number"));
    }
    Ok(phone)
}

fn generate_code() -> String {
    use rand::Rng;
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::ledger::InMemoryLedgerStore;
    use crate::sms::test::RecordingSmsSender;
    use crate::testing::test_token_service;

    fn flow(accounts: InMemoryAccountStore, sms: RecordingSmsSender) -> OtpFlow {
        let ledger = LedgerManager::new(Arc::new(InMemoryLedgerStore::new(accounts.clone())));
        OtpFlow::new(
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(sms),
            Arc::new(accounts),
            test_token_service(),
            ledger,
        )
    }

    fn extract_code(message: &str) -> String {
        message
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take(6)
            .collect()
    }

    #[tokio::test]
    async fn test_otp_round_trip_creates_account() {
        let accounts = InMemoryAccountStore::new();
        let sms = RecordingSmsSender::new();
        let flow = flow(accounts.clone(), sms.clone());

        flow.request_code(OtpRequest {
            phone: "+919876543210".to_string(),
        })
        .await
        .unwrap();

        let sent = sms.sent();
        assert_eq!(sent.len(), 1);
        let code = extract_code(&sent[0].1);

        let response = flow
            .verify_code(OtpVerifyRequest {
                phone: "+919876543210".to_string(),
                code,
            })
            .await
            .unwrap();

        assert_eq!(response.account.phone.as_deref(), Some("+919876543210"));
        // First login gets the signup bonus.
        assert_eq!(
            accounts
                .find_by_id(response.account.id)
                .await
                .unwrap()
                .unwrap()
                .coin_balance,
            50
        );
    }

    #[tokio::test]
    async fn test_otp_single_use() {
        let accounts = InMemoryAccountStore::new();
        let sms = RecordingSmsSender::new();
        let flow = flow(accounts, sms.clone());

        flow.request_code(OtpRequest {
            phone: "+919876543210".to_string(),
        })
        .await
        .unwrap();
        let code = extract_code(&sms.sent()[0].1);

        let request = || OtpVerifyRequest {
            phone: "+919876543210".to_string(),
            code: code.clone(),
        };
        flow.verify_code(request()).await.unwrap();
        assert!(flow.verify_code(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_code_rejected() {
        let accounts = InMemoryAccountStore::new();
        let sms = RecordingSmsSender::new();
        let flow = flow(accounts, sms.clone());

        flow.request_code(OtpRequest {
            phone: "+919876543210".to_string(),
        })
        .await
        .unwrap();

        assert!(flow
            .verify_code(OtpVerifyRequest {
                phone: "+919876543210".to_string(),
                code: "000000".to_string(),
            })
            .await
            .is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone("+91 98765 43210").unwrap(),
            "+919876543210"
        );
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("not-a-number").is_err());
    }
}
