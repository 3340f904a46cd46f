//! Outbound SMS, used for OTP delivery.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::config::SmsConfig;
use crate::error::{ApiError, Result};

/// Sends text messages.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<()>;
}

/// Logs instead of sending. The fallback when no SMS provider is configured.
pub struct ConsoleSmsSender;

#[async_trait]
impl SmsSender for ConsoleSmsSender {
    async fn send(&self, to: &str, message: &str) -> Result<()> {
        tracing::info!(to, message, "SMS (console delivery)");
        Ok(())
    }
}

/// Sender backed by an HTTP SMS provider.
pub struct HttpSmsSender {
    http: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    sender_id: String,
}

impl HttpSmsSender {
    #[must_use]
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, to: &str, message: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/messages", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({
                "sender": self.sender_id,
                "to": to,
                "message": message,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, "SMS provider rejected message");
            return Err(ApiError::service_unavailable("SMS delivery failed"));
        }
        Ok(())
    }
}

/// Recording sender for tests.
#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Captures messages instead of sending them.
    #[derive(Default, Clone)]
    pub struct RecordingSmsSender {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingSmsSender {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything sent so far, as `(to, message)` pairs.
        #[must_use]
        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SmsSender for RecordingSmsSender {
        async fn send(&self, to: &str, message: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), message.to_string()));
            Ok(())
        }
    }
}
