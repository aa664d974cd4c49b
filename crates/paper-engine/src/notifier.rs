//! Outbound notifications for trade events and periodic reports.
//!
//! Delivery failures are logged and swallowed: a dead mail server must
//! never stall the trading loop.

use std::sync::Arc;

use async_trait::async_trait;
use bot_core::config::SmtpConfig;
use bot_core::{Error, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str);
}

/// Used when no SMTP settings are configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, subject: &str, _body: &str) {
        debug!(subject, "notification suppressed, no SMTP configured");
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = cfg.from_email.parse().map_err(|e| Error::Config {
            message: format!("invalid SMTP from address: {e}"),
        })?;
        let to: Mailbox = cfg.to_email.parse().map_err(|e| Error::Config {
            message: format!("invalid SMTP to address: {e}"),
        })?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .map_err(|e| Error::Config {
                message: format!("invalid SMTP relay {}: {e}", cfg.host),
            })?
            .port(cfg.port)
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .body(body.to_string());

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                error!(subject, error = %e, "failed to build notification email");
                return;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => info!(subject, "notification email sent"),
            Err(e) => error!(subject, error = %e, "failed to send notification email"),
        }
    }
}

/// Build a notifier from optional SMTP settings, degrading to a no-op
/// when settings are absent or unusable.
pub fn build_notifier(smtp: Option<&SmtpConfig>) -> Arc<dyn Notifier> {
    match smtp {
        Some(cfg) => match SmtpNotifier::new(cfg) {
            Ok(notifier) => {
                info!(host = %cfg.host, "SMTP notifications enabled");
                Arc::new(notifier)
            }
            Err(e) => {
                warn!(error = %e, "SMTP misconfigured, notifications disabled");
                Arc::new(NoopNotifier)
            }
        },
        None => Arc::new(NoopNotifier),
    }
}
