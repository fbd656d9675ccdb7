use crate::error::{MailError, Result};
use crate::templates::{render_completion, EmailTemplate};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sitepulse_core::{CrawlStats, JobId, NotificationConfig};

const APP_NAME: &str = "SitePulse";

/// Receives the completion notice for a finished job.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_completion(
        &self,
        email: &str,
        job_id: &JobId,
        site_url: &str,
        stats: &CrawlStats,
    ) -> Result<()>;
}

pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    /// `None` when notifications are disabled or no relay host is set.
    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        if !config.enabled || config.smtp_host.trim().is_empty() {
            return None;
        }
        Some(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            username: config.smtp_username.clone(),
            password: config.smtp_password.clone().unwrap_or_default(),
            from: config.from_address.clone(),
        })
    }
}

/// Sends via SMTP (STARTTLS) using lettre's async transport.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = parse_mailbox(&config.from)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Relay(e.to_string()))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    async fn send(&self, email: &EmailTemplate) -> Result<()> {
        let msg = build_message(&self.from, email)?;
        self.transport
            .send(msg)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;
        tracing::info!("Completion email sent to {}", email.to);
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_completion(
        &self,
        email: &str,
        job_id: &JobId,
        site_url: &str,
        stats: &CrawlStats,
    ) -> Result<()> {
        let template = render_completion(APP_NAME, email, job_id, site_url, stats);
        self.send(&template).await
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn build_message(from: &Mailbox, email: &EmailTemplate) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(&email.to)?)
        .subject(&email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| MailError::Message(e.to_string()))
}
