//! Payment signature verification.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with the key secret and
//! webhook bodies with the webhook secret, both HMAC-SHA256 hex encoded.
//! Comparisons are constant time so the check leaks nothing about how much
//! of a forged signature matched.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &SecretString, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Compute the expected signature for a captured payment.
#[must_use]
pub fn payment_signature(secret: &SecretString, order_id: &str, payment_id: &str) -> String {
    hmac_hex(secret, format!("{order_id}|{payment_id}").as_bytes())
}

/// Verify a client-supplied payment signature.
#[must_use]
pub fn verify_payment_signature(
    secret: &SecretString,
    order_id: &str,
    payment_id: &str,
    provided: &str,
) -> bool {
    constant_time_eq(&payment_signature(secret, order_id, payment_id), provided)
}

/// Compute the expected signature over a raw webhook body.
#[must_use]
pub fn webhook_signature(secret: &SecretString, body: &[u8]) -> String {
    hmac_hex(secret, body)
}

/// Verify the signature header of a webhook delivery against the raw body.
#[must_use]
pub fn verify_webhook_signature(secret: &SecretString, body: &[u8], provided: &str) -> bool {
    constant_time_eq(&webhook_signature(secret, body), provided)
}
