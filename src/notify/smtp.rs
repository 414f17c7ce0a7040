use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use tracing::info;

use super::{templates, Notifier};
use crate::config::{EmailConfig, SmtpConfig};

pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    email: EmailConfig,
    verification_ttl_hours: i64,
}

impl SmtpNotifier {
    pub fn new(
        smtp: &SmtpConfig,
        email: EmailConfig,
        verification_ttl_hours: i64,
    ) -> anyhow::Result<Self> {
        let transport = SmtpTransport::relay(&smtp.host)
            .with_context(|| format!("smtp relay {}", smtp.host))?
            .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
            .build();
        let from = smtp
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("parse EMAIL_FROM {}", smtp.from))?;
        Ok(Self {
            transport,
            from,
            email,
            verification_ttl_hours,
        })
    }

    async fn send_html(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("parse recipient")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .context("build email")?;

        // lettre's SmtpTransport is blocking.
        let transport = self.transport.clone();
        let response = tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .context("smtp task")?
            .context("smtp send")?;
        info!(to = %to, code = %response.code(), "email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_verification_email(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> anyhow::Result<()> {
        let url = self.email.verification_url(token);
        let html = templates::verification_html(username, &url, self.verification_ttl_hours);
        self.send_html(email, templates::VERIFY_SUBJECT, html).await
    }

    async fn send_welcome_email(&self, email: &str, username: &str) -> anyhow::Result<()> {
        self.send_html(email, templates::WELCOME_SUBJECT, templates::welcome_html(username))
            .await
    }
}
