//! Cycle orchestrator — drives one batch through
//! classify → decide → execute → notify.
//!
//! Emails are handled strictly in order, one at a time. Per-email failures
//! become log entries; nothing inside a batch aborts the batch.

use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::dispatcher::NotificationDispatcher;
use crate::pipeline::executor::ActionExecutor;
use crate::pipeline::policy::decide;
use crate::pipeline::types::{
    ActionOutcome, CancelFlag, CycleReport, Decision, Email, EmailOutcome, ErrorStage, LogEntry,
};

pub struct CycleOrchestrator {
    classifier: Classifier,
    executor: ActionExecutor,
    dispatcher: NotificationDispatcher,
}

impl CycleOrchestrator {
    pub fn new(
        classifier: Classifier,
        executor: ActionExecutor,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            classifier,
            executor,
            dispatcher,
        }
    }

    /// Run one cycle over `emails`.
    ///
    /// `cancel` is checked before each email; an email already in flight
    /// always runs to its terminal state.
    pub async fn run_cycle(
        &self,
        emails: &[Email],
        config: &AgentConfig,
        cancel: &CancelFlag,
    ) -> CycleReport {
        info!(count = emails.len(), "Starting cycle");
        let mut report = CycleReport::default();

        for email in emails {
            if cancel.is_cancelled() {
                info!(
                    processed = report.total_processed,
                    remaining = emails.len() - report.total_processed,
                    "Cycle cancelled between emails"
                );
                report.cancelled = true;
                break;
            }

            let outcome = self.process_email(email, config).await;
            debug!(id = %email.id, state = outcome.label(), "Email reached terminal state");
            report.record(LogEntry {
                email_id: email.id.clone(),
                subject: email.subject.clone(),
                outcome,
            });
        }

        info!(
            processed = report.total_processed,
            scholarships = report.scholarship_count,
            jobs = report.job_count,
            applied = report.applied_count(),
            notifications = report.notification_count,
            errored = report.errored_count(),
            "Cycle complete"
        );
        report
    }

    async fn process_email(&self, email: &Email, config: &AgentConfig) -> EmailOutcome {
        let verdict = match self.classifier.classify(email).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(id = %email.id, subject = %email.subject, error = %e, "Classification failed");
                return EmailOutcome::Errored {
                    stage: ErrorStage::Classification,
                    reason: e.to_string(),
                };
            }
        };

        let category = match decide(&verdict) {
            Decision::Skip { category, reason } => {
                debug!(id = %email.id, category = %category, reason = ?reason, "Skipping email");
                return EmailOutcome::Skipped { reason };
            }
            Decision::Act { category } => category,
        };

        let outcome = self.executor.execute(email, &verdict, config).await;
        let confirmation_id = match &outcome {
            ActionOutcome::Submitted { confirmation_id } => confirmation_id.clone(),
            ActionOutcome::Failed { reason } => {
                return EmailOutcome::Errored {
                    stage: ErrorStage::Action,
                    reason: format!("application failed: {reason}"),
                };
            }
        };

        info!(id = %email.id, category = %category, subject = %email.subject, "Applied");

        let notification = self
            .dispatcher
            .notify(&config.whatsapp_number, email, &verdict, &outcome)
            .await;

        EmailOutcome::Applied {
            category,
            confirmation_id,
            notification,
        }
    }
}
