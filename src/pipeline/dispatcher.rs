//! Notification dispatcher — tells the user about a submitted application.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, warn};

use crate::error::NotifyError;
use crate::pipeline::types::{ActionOutcome, Email, NotificationResult, Notifier, Verdict};

/// E.164: optional '+', 8-15 digits, no leading zero.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{7,14}$").unwrap());

/// Test message sent by the configuration check.
pub const TEST_MESSAGE: &str =
    "🤖 Email Automation Agent Test\n\nThis is a test notification. Your agent is configured correctly!";

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Send the summary for a submitted application. Failures come back as
    /// `NotificationResult::Failed`; nothing here is fatal to the cycle.
    pub async fn notify(
        &self,
        destination: &str,
        email: &Email,
        verdict: &Verdict,
        outcome: &ActionOutcome,
    ) -> NotificationResult {
        let Some(confirmation_id) = outcome.confirmation_id() else {
            return NotificationResult::Failed {
                reason: "no successful application to report".into(),
            };
        };

        let message = format_message(email, verdict, confirmation_id);
        match self.deliver(destination, &message).await {
            Ok(()) => {
                info!(id = %email.id, notifier = self.notifier.name(), "Notification sent");
                NotificationResult::Sent
            }
            Err(e) => {
                warn!(id = %email.id, notifier = self.notifier.name(), error = %e, "Notification failed");
                NotificationResult::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Validate the destination and hand the message to the notifier.
    pub async fn deliver(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        let destination = normalize_destination(destination)?;
        self.notifier.send(&destination, message).await
    }
}

/// Strip formatting characters and check the result is an E.164 number.
pub fn normalize_destination(raw: &str) -> Result<String, NotifyError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if !PHONE_RE.is_match(&cleaned) {
        return Err(NotifyError::InvalidDestination(raw.to_string()));
    }

    if cleaned.starts_with('+') {
        Ok(cleaned)
    } else {
        Ok(format!("+{cleaned}"))
    }
}

fn format_message(email: &Email, verdict: &Verdict, confirmation_id: &str) -> String {
    let mut message = format!(
        "🎉 I automatically applied to a {} for you!\n\n📧 {}\n🆔 Confirmation: {}",
        verdict.category, email.subject, confirmation_id
    );
    if !verdict.details.is_empty() {
        message.push_str("\n\n");
        message.push_str(&verdict.details);
    }
    message
}
