//! Outbound email.
//!
//! Callers treat delivery as best effort: a failed send is logged by the
//! caller and never fails the triggering request.

pub mod smtp;

pub use smtp::SmtpMailer;

use async_trait::async_trait;

use crate::error::Result;

/// Sends transactional email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Logs instead of sending. The fallback when no SMTP server is configured,
/// and the mailer tests use.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to, subject, body, "Email (console delivery)");
        Ok(())
    }
}

/// Recording mailer for tests.
#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Captures messages instead of sending them.
    #[derive(Default, Clone)]
    pub struct RecordingMailer {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingMailer {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything sent so far, as `(to, subject)` pairs.
        #[must_use]
        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }
}
