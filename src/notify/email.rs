// src/notify/email.rs
//! SMTP delivery over STARTTLS via lettre.

use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use tracing::debug;

use crate::config::SmtpConfig;

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl Mailer {
    pub fn new(cfg: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = cfg
            .mail_from
            .parse()
            .with_context(|| format!("invalid MAIL_FROM address: {}", cfg.mail_from))?;
        let to = cfg
            .mail_to
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .with_context(|| format!("invalid MAIL_TO address: {addr}"))
            })
            .collect::<Result<Vec<_>>>()?;
        anyhow::ensure!(!to.is_empty(), "MAIL_TO must list at least one recipient");

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("invalid SMTP host: {}", cfg.host))?
            .port(cfg.port);
        if !cfg.username.is_empty() {
            builder =
                builder.credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        let msg = builder.body(body.to_string()).context("build email")?;

        self.transport.send(msg).await.context("send email")?;
        debug!(recipients = self.to.len(), "email accepted by relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "watcher".to_string(),
            password: "secret".to_string(),
            mail_from: "Earnings Watch <watch@example.com>".to_string(),
            mail_to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
        }
    }

    #[test]
    fn builds_with_named_sender_and_multiple_recipients() {
        assert!(Mailer::new(&base_config()).is_ok());
    }

    #[test]
    fn anonymous_relay_needs_no_credentials() {
        let mut cfg = base_config();
        cfg.username.clear();
        cfg.password.clear();
        assert!(Mailer::new(&cfg).is_ok());
    }

    #[test]
    fn rejects_malformed_addresses_and_empty_recipients() {
        let mut bad_from = base_config();
        bad_from.mail_from = "not-an-address".to_string();
        assert!(Mailer::new(&bad_from).is_err());

        let mut bad_to = base_config();
        bad_to.mail_to = vec!["@@".to_string()];
        assert!(Mailer::new(&bad_to).is_err());

        let mut empty_to = base_config();
        empty_to.mail_to.clear();
        assert!(Mailer::new(&empty_to).is_err());
    }
}
