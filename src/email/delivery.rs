//! Best-effort delivery policy for batch jobs.
//!
//! A failed send is logged and parked in a bounded dead-letter list; the
//! caller carries on. There are no retries.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDateTime;
use serde::Serialize;

use super::{EmailError, EmailMessage, EmailReceipt, EmailSender, TemplateKind};

/// Failed deliveries retained for inspection.
pub const DEAD_LETTER_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub kind: TemplateKind,
    pub recipients: Vec<String>,
    pub subject: String,
    pub error: String,
    pub failed_at: NaiveDateTime,
}

pub struct BestEffortDelivery {
    sender: Arc<dyn EmailSender>,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
}

impl BestEffortDelivery {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self {
            sender,
            dead_letters: Mutex::new(VecDeque::with_capacity(DEAD_LETTER_CAPACITY)),
        }
    }

    /// Attempt once. Failure is recorded and swallowed; `None` means the
    /// message was not accepted.
    pub async fn deliver(&self, message: &EmailMessage, at: NaiveDateTime) -> Option<EmailReceipt> {
        match self.sender.send(message).await {
            Ok(receipt) => {
                tracing::debug!(kind = %message.kind, id = %receipt.id, "Email delivered");
                Some(receipt)
            }
            Err(e) => {
                tracing::warn!(
                    kind = %message.kind,
                    recipients = message.to.len(),
                    error = %e,
                    "Email delivery failed"
                );
                self.park(message, &e, at);
                None
            }
        }
    }

    /// Attempt once and surface the failure. For single user-initiated actions.
    pub async fn send_now(&self, message: &EmailMessage) -> Result<EmailReceipt, EmailError> {
        self.sender.send(message).await
    }

    /// Most recent failures, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn park(&self, message: &EmailMessage, error: &EmailError, at: NaiveDateTime) {
        let mut letters = self
            .dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if letters.len() == DEAD_LETTER_CAPACITY {
            letters.pop_front();
        }
        letters.push_back(DeadLetter {
            kind: message.kind,
            recipients: message.to.clone(),
            subject: message.subject.clone(),
            error: error.to_string(),
            failed_at: at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::testing::RecordingSender;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    fn message(n: usize) -> EmailMessage {
        EmailMessage {
            to: vec!["a@x.id".into()],
            kind: TemplateKind::Reminder,
            subject: format!("reminder {n}"),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn success_is_not_parked() {
        let sender = Arc::new(RecordingSender::new());
        let delivery = BestEffortDelivery::new(sender.clone());
        assert!(delivery.deliver(&message(0), at()).await.is_some());
        assert_eq!(sender.sent().len(), 1);
        assert_eq!(delivery.dead_letter_count(), 0);
    }

    #[tokio::test]
    async fn failure_is_swallowed_and_parked() {
        let sender = Arc::new(RecordingSender::new());
        sender.fail_all(true);
        let delivery = BestEffortDelivery::new(sender);
        assert!(delivery.deliver(&message(0), at()).await.is_none());

        let letters = delivery.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].subject, "reminder 0");
        assert!(letters[0].error.contains("connection refused"));
    }

    #[tokio::test]
    async fn dead_letters_are_bounded() {
        let sender = Arc::new(RecordingSender::new());
        sender.fail_all(true);
        let delivery = BestEffortDelivery::new(sender);
        for n in 0..DEAD_LETTER_CAPACITY + 5 {
            delivery.deliver(&message(n), at()).await;
        }
        let letters = delivery.dead_letters();
        assert_eq!(letters.len(), DEAD_LETTER_CAPACITY);
        assert_eq!(letters[0].subject, "reminder 5");
    }

    #[tokio::test]
    async fn send_now_surfaces_failure() {
        let sender = Arc::new(RecordingSender::new());
        sender.fail_all(true);
        let delivery = BestEffortDelivery::new(sender);
        assert!(delivery.send_now(&message(0)).await.is_err());
        assert_eq!(delivery.dead_letter_count(), 0);
    }
}
