//! Demo mailbox with the same two sample opportunities every cycle.
//!
//! Lets the agent run end to end without mailbox credentials.

use async_trait::async_trait;
use chrono::Utc;

use crate::config::AgentConfig;
use crate::error::MailboxError;
use crate::pipeline::types::{Email, MailboxSource};

#[derive(Debug, Default)]
pub struct DemoMailbox;

impl DemoMailbox {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailboxSource for DemoMailbox {
    async fn fetch_emails(&self, _config: &AgentConfig) -> Result<Vec<Email>, MailboxError> {
        tracing::debug!("Serving demo batch");
        Ok(sample_emails())
    }
}

pub fn sample_emails() -> Vec<Email> {
    let now = Utc::now();
    vec![
        Email {
            id: "demo-1".into(),
            subject: "Fulbright Scholarship 2024 Application".into(),
            sender: "scholarships@fulbright.org".into(),
            body: "Applications are now open for the Fulbright Scholarship program. \
                   Apply at https://fulbright.org/apply before the deadline on October 15."
                .into(),
            received_at: now,
        },
        Email {
            id: "demo-2".into(),
            subject: "Software Engineer Position at Tech Corp".into(),
            sender: "careers@techcorp.com".into(),
            body: "We are hiring a Software Engineer to join our platform team. \
                   Submit your application at https://techcorp.com/careers/apply."
                .into(),
            received_at: now,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::test_config;

    #[tokio::test]
    async fn demo_batch_has_two_opportunities() {
        let emails = DemoMailbox::new().fetch_emails(&test_config()).await.unwrap();
        assert_eq!(emails.len(), 2);
        assert_ne!(emails[0].id, emails[1].id);
        assert!(emails[0].body.contains("https://fulbright.org/apply"));
        assert!(emails[1].body.contains("https://techcorp.com/careers/apply"));
    }
}
