//! Email notifier — sends article summaries over SMTP via lettre.
//!
//! One plain-text email per summarized link, with a fixed subject, to every
//! configured recipient. Delivery failures are logged and dropped.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, NotifyError};
use crate::pipeline::types::{Notifier, SummaryReport};

/// Subject line of every notification.
pub const NOTIFICATION_SUBJECT: &str = "New Article Notification";

/// Submission port, upgraded with STARTTLS.
const DEFAULT_SMTP_PORT: u16 = 587;

/// Port on which SMTP speaks TLS from the first byte instead of STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

// ── Configuration ───────────────────────────────────────────────────

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub recipients: Vec<String>,
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let smtp_host = get("EMAIL_SMTP_HOST")
            .ok_or_else(|| ConfigError::MissingEnvVar("EMAIL_SMTP_HOST".into()))?;

        let smtp_port = match get("EMAIL_SMTP_PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "EMAIL_SMTP_PORT".into(),
                message: format!("'{raw}': {e}"),
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        let username = get("EMAIL_USERNAME").unwrap_or_default();
        let password = SecretString::from(get("EMAIL_PASSWORD").unwrap_or_default());
        let from_address = get("EMAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone());

        let recipients = parse_recipients(&get("EMAIL_RECIPIENTS").unwrap_or_default());
        if recipients.is_empty() {
            return Err(ConfigError::MissingEnvVar("EMAIL_RECIPIENTS".into()));
        }

        Ok(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            recipients,
        })
    }
}

fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Notifier ────────────────────────────────────────────────────────

/// SMTP-backed `Notifier`.
pub struct EmailNotifier {
    config: EmailConfig,
    transport: SmtpTransport,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.smtp_host)
        } else {
            SmtpTransport::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| NotifyError::Transport(format!("SMTP relay error: {e}")))?;

        let transport = builder.port(config.smtp_port).credentials(creds).build();

        Ok(Self { config, transport })
    }

    /// Build the notification email for a report.
    pub fn build_message(&self, report: &SummaryReport) -> Result<Message, NotifyError> {
        let from: Mailbox = parse_mailbox(&self.config.from_address)?;

        let mut builder = Message::builder()
            .from(from)
            .subject(NOTIFICATION_SUBJECT)
            .header(ContentType::TEXT_PLAIN);

        for recipient in &self.config.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        builder
            .body(format_body(report))
            .map_err(|e| NotifyError::Build(e.to_string()))
    }

    /// Build and send, reporting any failure.
    pub async fn send(&self, report: &SummaryReport) -> Result<(), NotifyError> {
        let email = self.build_message(report)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| NotifyError::Transport(format!("send task failed: {e}")))?
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, report: &SummaryReport) {
        match self.send(report).await {
            Ok(()) => tracing::info!(
                url = %report.source_url,
                recipients = self.config.recipients.len(),
                "Information mail sent successfully"
            ),
            Err(e) => tracing::error!(
                url = %report.source_url,
                error = %e,
                "Information mail couldn't be sent"
            ),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| {
        NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Plain-text body: link, original post, summary.
pub fn format_body(report: &SummaryReport) -> String {
    format!(
        "URL LINK: {}\n\nTELEGRAM MESSAGE: {}\n\nNEWS: {}\n",
        report.source_url, report.original_message_text, report.summary_text
    )
}
