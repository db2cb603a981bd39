//! Action executor — one application attempt per eligible email.
//!
//! Every failure inside the actor, including a panic, comes back as
//! `ActionOutcome::Failed`. The actor runs on its own task, so dropping
//! the cycle future never cuts a submission off halfway.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::ActionError;
use crate::pipeline::types::{ActionOutcome, ApplicationActor, ApplicationRequest, Email, Verdict};

pub struct ActionExecutor {
    actor: Arc<dyn ApplicationActor>,
}

impl ActionExecutor {
    pub fn new(actor: Arc<dyn ApplicationActor>) -> Self {
        Self { actor }
    }

    /// Attempt the application once. Never retries, never returns `Err`.
    pub async fn execute(
        &self,
        email: &Email,
        verdict: &Verdict,
        config: &AgentConfig,
    ) -> ActionOutcome {
        let request = build_request(email, verdict, config);
        let actor = Arc::clone(&self.actor);

        info!(
            id = %email.id,
            actor = actor.name(),
            url = %request.action_url,
            "Submitting application"
        );

        let submission = tokio::spawn(async move { actor.submit(&request).await }).await;

        let result = match submission {
            Ok(result) => result,
            Err(join_err) => {
                error!(id = %email.id, error = %join_err, "Application actor task failed");
                Err(ActionError::Crashed(join_err.to_string()))
            }
        };

        match result {
            Ok(()) => {
                let confirmation_id = new_confirmation_id();
                info!(id = %email.id, confirmation_id = %confirmation_id, "Application submitted");
                ActionOutcome::Submitted { confirmation_id }
            }
            Err(e) => {
                warn!(id = %email.id, error = %e, "Application failed");
                ActionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn build_request(email: &Email, verdict: &Verdict, config: &AgentConfig) -> ApplicationRequest {
    ApplicationRequest {
        email_id: email.id.clone(),
        action_url: verdict.action_url.trim().to_string(),
        category: verdict.category,
        applicant_email: config.email.clone(),
        resume_url: config.resume_url.clone(),
        cover_letter_template: config.cover_letter_template.clone(),
        subject: email.subject.clone(),
        sender: email.sender.clone(),
        details: verdict.details.clone(),
    }
}

/// `APP-<unix millis>-<8 hex>`; the random suffix keeps ids unique within
/// the same millisecond.
fn new_confirmation_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("APP-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
