//! Digest delivery over SMTP.
//!
//! Builds a multipart/alternative message (plain text + HTML) with `lettre`
//! and sends it over implicit TLS.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::{MailCredentials, SmtpConfig};
use crate::error::{Error, Result};
use crate::render::RenderedDigest;

/// Something that can deliver a rendered digest.
pub trait Notifier {
    fn send(&self, digest: &RenderedDigest) -> Result<()>;
}

pub struct SmtpNotifier {
    host: String,
    port: u16,
    from: Mailbox,
    to: Mailbox,
    credentials: MailCredentials,
}

impl SmtpNotifier {
    /// Addresses are parsed here so a bad `DIGEST_TO` or `[smtp] from`
    /// fails before any source is fetched or the registry is written.
    pub fn new(config: &SmtpConfig, credentials: MailCredentials) -> Result<Self> {
        let from = config.from.as_deref().unwrap_or(&credentials.username);
        let from = parse_mailbox("sender", from)?;
        let to = parse_mailbox("recipient", &credentials.recipient)?;
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            from,
            to,
            credentials,
        })
    }

    pub fn recipient(&self) -> &Mailbox {
        &self.to
    }
}

fn parse_mailbox(role: &str, raw: &str) -> Result<Mailbox> {
    raw.parse()
        .map_err(|e| Error::InvalidConfig(format!("invalid {role} address \"{raw}\": {e}")))
}

/// Build the MIME message for `digest`.
pub fn build_message(from: &Mailbox, to: &Mailbox, digest: &RenderedDigest) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(digest.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            digest.text.clone(),
            digest.html.clone(),
        ))
        .map_err(|e| Error::Delivery(format!("failed to build message: {e}")))
}

impl Notifier for SmtpNotifier {
    fn send(&self, digest: &RenderedDigest) -> Result<()> {
        let message = build_message(&self.from, &self.to, digest)?;

        let transport = SmtpTransport::relay(&self.host)
            .map_err(|e| Error::Delivery(format!("smtp relay {}: {e}", self.host)))?
            .port(self.port)
            .credentials(Credentials::new(
                self.credentials.username.clone(),
                self.credentials.password.clone(),
            ))
            .build();

        transport
            .send(&message)
            .map_err(|e| Error::Delivery(e.to_string()))?;

        info!(to = %self.to, subject = %digest.subject, "digest sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered() -> RenderedDigest {
        RenderedDigest {
            subject: "Daily DDL Digest".to_string(),
            text: "1 pending".to_string(),
            html: "<p>1 pending</p>".to_string(),
        }
    }

    fn credentials(recipient: &str) -> MailCredentials {
        MailCredentials {
            username: "me@example.test".to_string(),
            password: "secret".to_string(),
            recipient: recipient.to_string(),
        }
    }

    #[test]
    fn message_has_both_alternatives() {
        let notifier =
            SmtpNotifier::new(&SmtpConfig::default(), credentials("you@example.test")).unwrap();
        let message = build_message(&notifier.from, &notifier.to, &rendered()).expect("message");
        let formatted = String::from_utf8(message.formatted()).expect("utf8");

        assert!(formatted.contains("Subject: Daily DDL Digest"));
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("text/plain"));
        assert!(formatted.contains("text/html"));
    }

    #[test]
    fn invalid_recipient_is_rejected_at_construction() {
        let err = SmtpNotifier::new(&SmtpConfig::default(), credentials("not an address"))
            .err()
            .expect("invalid recipient");
        assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("recipient")));
    }

    #[test]
    fn invalid_sender_is_rejected_at_construction() {
        let config = SmtpConfig {
            from: Some("digest bot".to_string()),
            ..SmtpConfig::default()
        };
        let err = SmtpNotifier::new(&config, credentials("you@example.test"))
            .err()
            .expect("invalid sender");
        assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("sender")));
    }

    #[test]
    fn sender_defaults_to_username() {
        let notifier =
            SmtpNotifier::new(&SmtpConfig::default(), credentials("you@example.test")).unwrap();
        assert_eq!(notifier.from.email.to_string(), "me@example.test");
        assert_eq!(notifier.recipient().email.to_string(), "you@example.test");
    }
}
