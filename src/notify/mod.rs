//! Outgoing account emails.
//!
//! Delivery is best-effort: callers go through [`deliver`], which bounds the
//! send with a timeout and logs failures instead of returning them.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::EmailConfig;

mod smtp;
mod templates;

pub use smtp::SmtpNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification_email(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> anyhow::Result<()>;

    async fn send_welcome_email(&self, email: &str, username: &str) -> anyhow::Result<()>;
}

/// Dev-mode sender that only logs what would have been mailed.
pub struct LogNotifier {
    email: EmailConfig,
}

impl LogNotifier {
    pub fn new(email: EmailConfig) -> Self {
        Self { email }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_email(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> anyhow::Result<()> {
        info!(
            to = %email,
            %username,
            url = %self.email.verification_url(token),
            "email service not configured; verification email logged"
        );
        Ok(())
    }

    async fn send_welcome_email(&self, email: &str, username: &str) -> anyhow::Result<()> {
        info!(to = %email, %username, "email service not configured; welcome email logged");
        Ok(())
    }
}

/// Runs one send with a deadline. Failures are logged and swallowed.
pub async fn deliver<F>(what: &'static str, to: &str, timeout: Duration, send: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(timeout, send).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, email = %to, what, "email delivery failed"),
        Err(_) => warn!(email = %to, what, ?timeout, "email delivery timed out"),
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Verification { email: String, token: String },
        Welcome { email: String },
    }

    /// Captures everything sent, optionally failing every call.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Sent>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        pub fn last_token_for(&self, email: &str) -> Option<String> {
            self.sent.lock().unwrap().iter().rev().find_map(|s| match s {
                Sent::Verification { email: e, token } if e == email => Some(token.clone()),
                _ => None,
            })
        }

        pub fn welcome_count(&self, email: &str) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|s| matches!(s, Sent::Welcome { email: e } if e == email))
                .count()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_verification_email(
            &self,
            email: &str,
            _username: &str,
            token: &str,
        ) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(Sent::Verification {
                email: email.into(),
                token: token.into(),
            });
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            Ok(())
        }

        async fn send_welcome_email(&self, email: &str, _username: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(Sent::Welcome { email: email.into() });
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deliver_swallows_errors_and_timeouts() {
        deliver("verification", "a@b.com", Duration::from_secs(1), async {
            anyhow::bail!("boom")
        })
        .await;

        deliver("welcome", "a@b.com", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
    }
}
