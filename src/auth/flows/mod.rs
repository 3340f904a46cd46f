//! Login and registration flows.
//!
//! Each flow is a small service struct over the stores it needs; all of them
//! end by issuing an access token for the resolved account.

pub mod google;
pub mod login;
pub mod otp;
pub mod register;

pub use google::{GoogleFlow, GoogleTokenVerifier, LiveGoogleVerifier, VerifiedIdentity};
pub use login::LoginFlow;
pub use otp::{InMemoryOtpStore, OtpFlow, OtpStore};
pub use register::RegisterFlow;

use serde::Serialize;

use crate::accounts::Account;
use crate::auth::jwt::IssuedToken;

/// Successful authentication: the account plus a fresh access token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub account: Account,
    pub token: IssuedToken,
}
