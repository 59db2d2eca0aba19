use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmailError, EmailMessage, EmailReceipt, EmailSender};
use crate::config::EmailConfig;

/// Sends mail by POSTing JSON to a transactional email provider.
pub struct WebhookSender {
    endpoint: String,
    api_key: Option<String>,
    from: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct WebhookRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
    tags: [&'a str; 1],
}

#[derive(Deserialize, Default)]
struct WebhookResponse {
    #[serde(default)]
    id: Option<String>,
}

impl WebhookSender {
    pub fn new(endpoint: &str, config: &EmailConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmailError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl EmailSender for WebhookSender {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, EmailError> {
        if message.to.is_empty() {
            return Err(EmailError::NoRecipients(message.kind));
        }

        let body = WebhookRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
            tags: [message.kind.as_str()],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmailError::Timeout(self.timeout_secs)
            } else {
                EmailError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // Providers differ in what they return; a missing id is not an error.
        let parsed: WebhookResponse = response.json().await.unwrap_or_default();
        Ok(EmailReceipt {
            success: true,
            id: parsed.id.unwrap_or_default(),
        })
    }
}
