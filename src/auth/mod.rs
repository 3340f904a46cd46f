//! Authentication: token issuance and verification, password hashing, the
//! route guard, and the login/registration flows.

pub mod flows;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use flows::{
    AuthResponse, GoogleFlow, GoogleTokenVerifier, InMemoryOtpStore, LiveGoogleVerifier, LoginFlow,
    OtpFlow, OtpStore, RegisterFlow, VerifiedIdentity,
};
pub use jwt::{Claims, IssuedToken, TokenService};
pub use middleware::{require_auth, CurrentAccount};
pub use password::{PasswordConfig, PasswordHasher};
