use crate::config::SmtpConfig;
use crate::errors::Result;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

/// Outbound delivery of password-reset messages. Failures are surfaced to the
/// caller but never roll back an already-issued reset token.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_password_reset(&self, to: &str, host: &str, token: &str) -> Result<()>;
}

/// Reset link embedded in the notification body.
pub(crate) fn reset_link(host: &str, token: &str) -> String {
    format!("https://{host}/password/reset?token={token}")
}

/// [`Notifier`] delivering over an async SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid SMTP_FROM address: {e}"))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .map_err(|e| anyhow::anyhow!("smtp relay setup failed: {e}"))?
            .credentials(SmtpCredentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_password_reset(&self, to: &str, host: &str, token: &str) -> Result<()> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid recipient address {to}: {e}"))?;
        let body = format!(
            "A password reset was requested for this address.\n\n\
             Follow the link below to choose a new password:\n{}\n\n\
             If you did not request this, you can ignore this message.\n",
            reset_link(host, token)
        );
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject("Password reset request")
            .body(body)
            .map_err(|e| anyhow::anyhow!("building reset message failed: {e}"))?;

        self.transport.send(message).await.map_err(|e| {
            error!(error = %e, to = %to, "reset message delivery failed");
            anyhow::anyhow!(e.to_string())
        })?;
        info!(to = %to, "password reset message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_embeds_host_and_token() {
        let link = reset_link("example.com", "tok-123");
        assert_eq!(link, "https://example.com/password/reset?token=tok-123");
    }

    #[test]
    fn notifier_rejects_malformed_from_address() {
        let cfg = SmtpConfig {
            host: "smtp.example.com".into(),
            username: "user".into(),
            password: "pass".into(),
            from: "not an address".into(),
        };
        assert!(SmtpNotifier::new(&cfg).is_err());
    }
}
