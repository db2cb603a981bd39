//! Shared types for the triage-and-action pipeline.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::error::{ActionError, MailboxError, NotifyError};

// ── Email ───────────────────────────────────────────────────────────

/// One fetched email. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    /// Unique within a batch.
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

// ── Verdict ─────────────────────────────────────────────────────────

/// Opportunity category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Scholarship,
    Job,
    Other,
}

impl Category {
    /// Normalize a model-supplied category string. `None` for anything
    /// outside the three known values.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "scholarship" => Some(Self::Scholarship),
            "job" => Some(Self::Job),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Scholarship => "scholarship",
            Self::Job => "job",
            Self::Other => "other",
        }
    }

    /// Scholarship and Job are the categories the agent can apply to.
    pub fn is_opportunity(&self) -> bool {
        matches!(self, Self::Scholarship | Self::Job)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The classifier's validated judgment about one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub category: Category,
    pub should_act: bool,
    /// Where to apply. Empty when the model gave none.
    pub action_url: String,
    pub details: String,
}

// ── Decision ────────────────────────────────────────────────────────

/// Why an email was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The model said not to act, or the category is not an opportunity.
    NotAnOpportunity,
    /// The model said to act but gave no URL to act on.
    MissingActionUrl,
}

/// Output of the decision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Act { category: Category },
    Skip { category: Category, reason: SkipReason },
}

// ── Action / notification outcomes ──────────────────────────────────

/// Result of one application attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Submitted { confirmation_id: String },
    Failed { reason: String },
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }

    pub fn confirmation_id(&self) -> Option<&str> {
        match self {
            Self::Submitted { confirmation_id } => Some(confirmation_id),
            Self::Failed { .. } => None,
        }
    }
}

/// Side-effect acknowledgement from the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationResult {
    Sent,
    Failed { reason: String },
}

impl NotificationResult {
    pub fn sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

// ── Structured cycle log ────────────────────────────────────────────

/// Pipeline stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Classification,
    Action,
}

/// Terminal state of one email in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EmailOutcome {
    Skipped {
        reason: SkipReason,
    },
    Applied {
        category: Category,
        confirmation_id: String,
        notification: NotificationResult,
    },
    Errored {
        stage: ErrorStage,
        reason: String,
    },
}

impl EmailOutcome {
    /// Whether the email is done with. A classification error may be
    /// transient, so that email is left for a later cycle.
    pub fn is_final(&self) -> bool {
        !matches!(
            self,
            Self::Errored {
                stage: ErrorStage::Classification,
                ..
            }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Applied { .. } => "applied",
            Self::Errored { .. } => "errored",
        }
    }
}

/// Exactly one entry per email that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub email_id: String,
    pub subject: String,
    pub outcome: EmailOutcome,
}

impl LogEntry {
    /// Human-readable lines for a display layer.
    pub fn render_lines(&self) -> Vec<String> {
        let subject = &self.subject;
        match &self.outcome {
            EmailOutcome::Skipped {
                reason: SkipReason::NotAnOpportunity,
            } => vec![format!("Skipped: {subject} (not an opportunity)")],
            EmailOutcome::Skipped {
                reason: SkipReason::MissingActionUrl,
            } => vec![format!("Skipped: {subject} (no application URL)")],
            EmailOutcome::Applied {
                category,
                notification,
                ..
            } => {
                let notice = match notification {
                    NotificationResult::Sent => format!("Notification sent for: {subject}"),
                    NotificationResult::Failed { reason } => {
                        format!("Notification failed for: {subject}: {reason}")
                    }
                };
                vec![format!("Applied to {category}: {subject}"), notice]
            }
            EmailOutcome::Errored { reason, .. } => {
                vec![format!("Error processing {subject}: {reason}")]
            }
        }
    }
}

// ── Cycle report ────────────────────────────────────────────────────

/// Everything one cycle computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub total_processed: usize,
    pub scholarship_count: usize,
    pub job_count: usize,
    pub notification_count: usize,
    pub log: Vec<LogEntry>,
    /// Set when the cycle stopped early between emails.
    pub cancelled: bool,
}

impl CycleReport {
    /// Record one email's terminal state and update the counters.
    pub(crate) fn record(&mut self, entry: LogEntry) {
        self.total_processed += 1;
        if let EmailOutcome::Applied {
            category,
            notification,
            ..
        } = &entry.outcome
        {
            match category {
                Category::Scholarship => self.scholarship_count += 1,
                Category::Job => self.job_count += 1,
                Category::Other => {}
            }
            if notification.sent() {
                self.notification_count += 1;
            }
        }
        self.log.push(entry);
    }

    pub fn applied_count(&self) -> usize {
        self.scholarship_count + self.job_count
    }

    pub fn errored_count(&self) -> usize {
        self.log
            .iter()
            .filter(|e| matches!(e.outcome, EmailOutcome::Errored { .. }))
            .count()
    }

    /// Ids of emails that need no further processing.
    pub fn finished_ids(&self) -> Vec<String> {
        self.log
            .iter()
            .filter(|e| e.outcome.is_final())
            .map(|e| e.email_id.clone())
            .collect()
    }

    /// Rendered log lines, in processing order.
    pub fn log_lines(&self) -> Vec<String> {
        self.log.iter().flat_map(LogEntry::render_lines).collect()
    }

    /// Response shape consumed by a display layer.
    pub fn to_response(&self) -> CycleResponse {
        CycleResponse {
            processed: self.total_processed,
            scholarships: self.scholarship_count,
            jobs: self.job_count,
            notifications: self.notification_count,
            logs: self.log_lines(),
        }
    }
}

/// `{processed, scholarships, jobs, notifications, logs}` display shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleResponse {
    pub processed: usize,
    pub scholarships: usize,
    pub jobs: usize,
    pub notifications: usize,
    pub logs: Vec<String>,
}

// ── Cancellation ────────────────────────────────────────────────────

/// Cooperative stop signal, checked between emails.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Everything an Application Actor needs for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    pub email_id: String,
    pub action_url: String,
    pub category: Category,
    pub applicant_email: String,
    pub resume_url: String,
    /// Raw template; substitution is the actor's concern.
    pub cover_letter_template: String,
    pub subject: String,
    pub sender: String,
    pub details: String,
}

/// Inbox access. Pure I/O, no business logic.
#[async_trait]
pub trait MailboxSource: Send + Sync {
    /// Fetch the next batch of emails to process. Must not mark anything
    /// as handled.
    async fn fetch_emails(&self, config: &AgentConfig) -> Result<Vec<Email>, MailboxError>;

    /// Mark emails from the last batch as handled so later fetches skip
    /// them. Ids not in the last batch are ignored.
    async fn acknowledge(
        &self,
        _config: &AgentConfig,
        _ids: &[String],
    ) -> Result<(), MailboxError> {
        Ok(())
    }
}

/// Performs the actual application submission.
#[async_trait]
pub trait ApplicationActor: Send + Sync {
    fn name(&self) -> &str;

    /// Submit one application. Called at most once per email per cycle.
    async fn submit(&self, request: &ApplicationRequest) -> Result<(), ActionError>;
}

/// Outbound message delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `message` to an already-validated destination.
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError>;
}
