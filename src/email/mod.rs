//! Outbound email: what gets sent, not how a provider delivers it.
//!
//! The pipeline talks to an [`EmailSender`]. Production uses the webhook
//! transport when an endpoint is configured and [`LogOnlySender`] otherwise.
//! Batch jobs go through [`BestEffortDelivery`], which never propagates a
//! transport failure.

pub mod delivery;
pub mod templates;
pub mod webhook;

pub use delivery::*;
pub use templates::*;
pub use webhook::*;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("No recipients for {0} email")]
    NoRecipients(TemplateKind),
    #[error("Email transport failed: {0}")]
    Transport(String),
    #[error("Email provider rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Email request timed out after {0}s")]
    Timeout(u64),
}

/// Template family a message was rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateKind {
    Reminder,
    Missed,
    WeeklySummary,
    Test,
    FamilyWelcome,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Missed => "missed",
            Self::WeeklySummary => "weeklySummary",
            Self::Test => "test",
            Self::FamilyWelcome => "familyWelcome",
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered message addressed to one or more recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub kind: TemplateKind,
    pub subject: String,
    pub body: String,
}

/// Provider acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailReceipt {
    pub success: bool,
    pub id: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, EmailError>;
}

/// Writes messages to the log instead of sending them. Used when no
/// email endpoint is configured.
#[derive(Debug, Default)]
pub struct LogOnlySender;

#[async_trait]
impl EmailSender for LogOnlySender {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, EmailError> {
        if message.to.is_empty() {
            return Err(EmailError::NoRecipients(message.kind));
        }
        tracing::info!(
            kind = %message.kind,
            recipients = message.to.len(),
            subject = %message.subject,
            "Email not sent (no endpoint configured)"
        );
        Ok(EmailReceipt {
            success: true,
            id: format!("log-{}", Uuid::new_v4()),
        })
    }
}
