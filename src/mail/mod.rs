//! Report delivery over SMTP.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::EmailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// A configured address failed to parse.
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// SMTP mailer with parsed addresses, built once per run.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    reply_to: Mailbox,
    recipients: Vec<Mailbox>,
}

impl Mailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        let from: Mailbox = config.from_email.parse()?;
        let reply_to: Mailbox = config.reply_to_email.parse()?;
        let recipients = config
            .recipients
            .iter()
            .map(|address| address.parse())
            .collect::<Result<Vec<Mailbox>, _>>()?;

        Ok(Self {
            transport,
            from,
            reply_to,
            recipients,
        })
    }

    /// Send the report to every configured recipient as separate messages,
    /// each with a plain-text part and an HTML part.
    pub async fn send_report(
        &self,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        for recipient in &self.recipients {
            let message = Message::builder()
                .from(self.from.clone())
                .reply_to(self.reply_to.clone())
                .to(recipient.clone())
                .subject(subject)
                .multipart(MultiPart::alternative_plain_html(
                    plain_body.to_string(),
                    html_body.to_string(),
                ))?;

            self.transport.send(message).await?;
            info!(recipient = %recipient.email, "sent report email");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            smtp_username: "user".into(),
            smtp_password: "pass".into(),
            from_email: "Reports <reports@example.com>".into(),
            reply_to_email: "ops@example.com".into(),
            recipients: vec!["a@example.com".into(), "b@example.com".into()],
        }
    }

    #[tokio::test]
    async fn mailer_builds_from_valid_config() {
        let mailer = Mailer::from_config(&config()).unwrap();
        assert_eq!(mailer.recipients.len(), 2);
        assert_eq!(mailer.from.email.to_string(), "reports@example.com");
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected() {
        let mut bad = config();
        bad.recipients = vec!["not an address".into()];
        assert!(matches!(
            Mailer::from_config(&bad),
            Err(MailError::Address(_))
        ));
    }
}
