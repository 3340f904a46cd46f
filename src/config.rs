use secrecy::SecretString;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, Result};

/// Main configuration for the ErthaLoka API service.
#[derive(Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database_url: String,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub smtp: Option<SmtpConfig>,
    pub sms: Option<SmsConfig>,
    /// Interval between subscription expiry sweeps.
    pub expiry_sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ApiError::internal(format!("Invalid listen address: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Token issuance settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret.
    pub jwt_secret: SecretString,
    /// Token issuer (iss claim).
    pub issuer: String,
    /// Access token lifetime.
    pub token_ttl: Duration,
    /// OAuth client id for Google sign-in; when set, ID tokens minted for
    /// other clients are rejected.
    pub google_client_id: Option<String>,
}

/// Payment gateway credentials.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Public key id sent to the client for checkout.
    pub key_id: String,
    /// Shared secret used to verify payment signatures.
    pub key_secret: SecretString,
    /// Shared secret used to verify webhook bodies.
    pub webhook_secret: SecretString,
    /// Base URL of the gateway API.
    pub api_base: String,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

#[derive(Clone)]
pub struct SmsConfig {
    pub api_base: String,
    pub api_key: SecretString,
    pub sender_id: String,
}

impl Config {
    /// Load configuration from `ERTHALOKA_*` environment variables.
    ///
    /// Required: `ERTHALOKA_DATABASE_URL`, `ERTHALOKA_JWT_SECRET`,
    /// `ERTHALOKA_GATEWAY_KEY_ID`, `ERTHALOKA_GATEWAY_KEY_SECRET`,
    /// `ERTHALOKA_GATEWAY_WEBHOOK_SECRET`. Everything else has defaults;
    /// SMTP and SMS fall back to console delivery when unset.
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env_or("ERTHALOKA_HOST", "0.0.0.0"),
            port: env_parse_or("ERTHALOKA_PORT", 8000)?,
        };

        let logging = LoggingConfig {
            level: env_or("ERTHALOKA_LOG_LEVEL", "info"),
            json: env_parse_or("ERTHALOKA_LOG_JSON", false)?,
        };

        let auth = AuthConfig {
            jwt_secret: required_secret("ERTHALOKA_JWT_SECRET")?,
            issuer: env_or("ERTHALOKA_JWT_ISSUER", "erthaloka"),
            token_ttl: Duration::from_secs(env_parse_or(
                "ERTHALOKA_TOKEN_TTL_SECS",
                7 * 24 * 60 * 60,
            )?),
            google_client_id: std::env::var("ERTHALOKA_GOOGLE_CLIENT_ID").ok(),
        };

        let gateway = GatewayConfig {
            key_id: required("ERTHALOKA_GATEWAY_KEY_ID")?,
            key_secret: required_secret("ERTHALOKA_GATEWAY_KEY_SECRET")?,
            webhook_secret: required_secret("ERTHALOKA_GATEWAY_WEBHOOK_SECRET")?,
            api_base: env_or("ERTHALOKA_GATEWAY_API_BASE", "https://api.razorpay.com/v1"),
        };

        let smtp = match std::env::var("ERTHALOKA_SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: env_parse_or("ERTHALOKA_SMTP_PORT", 587)?,
                username: required("ERTHALOKA_SMTP_USERNAME")?,
                password: required_secret("ERTHALOKA_SMTP_PASSWORD")?,
                from_address: required("ERTHALOKA_SMTP_FROM")?,
            }),
            Err(_) => None,
        };

        let sms = match std::env::var("ERTHALOKA_SMS_API_BASE") {
            Ok(api_base) => Some(SmsConfig {
                api_base,
                api_key: required_secret("ERTHALOKA_SMS_API_KEY")?,
                sender_id: env_or("ERTHALOKA_SMS_SENDER_ID", "ERTHLK"),
            }),
            Err(_) => None,
        };

        Ok(Self {
            server,
            logging,
            database_url: required("ERTHALOKA_DATABASE_URL")?,
            auth,
            gateway,
            smtp,
            sms,
            expiry_sweep_interval: Duration::from_secs(env_parse_or(
                "ERTHALOKA_EXPIRY_SWEEP_SECS",
                3600,
            )?),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ApiError::internal(format!("Invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ApiError::internal(format!("Missing required env var {key}")))
}

fn required_secret(key: &str) -> Result<SecretString> {
    required(key).map(SecretString::from)
}
