/// Email fallback channel for recipients with no live session and no push
use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP transport, or no-op (log only) when no host is configured
#[derive(Clone)]
pub struct SmtpEmailChannel {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl SmtpEmailChannel {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid SMTP_FROM address: {}", e)))?;

        let transport = if config.host.trim().is_empty() {
            warn!("SMTP host not configured; email fallback will operate in no-op mode");
            None
        } else {
            let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| {
                    AppError::Config(format!("Failed to configure SMTP transport: {}", e))
                })?
                .port(config.port);

            let builder = match (&config.username, &config.password) {
                (Some(username), Some(password)) => {
                    builder.credentials(Credentials::new(username.clone(), password.clone()))
                }
                _ => builder,
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl EmailChannel for SmtpEmailChannel {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(subject, recipient = to, "Email channel in no-op mode; skipping send");
            return Ok(());
        };

        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient email address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Email(format!("Failed to build email message: {}", e)))?;

        transport
            .send(email)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send email: {}", e)))?;
        info!(subject, "Email sent");
        Ok(())
    }
}
