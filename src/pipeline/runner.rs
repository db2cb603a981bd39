//! Cycle runner. Wires config, mailbox and judgment service around one
//! orchestrated cycle.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::ConfigStore;
use crate::error::CycleError;
use crate::llm::LlmSource;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::dispatcher::NotificationDispatcher;
use crate::pipeline::executor::ActionExecutor;
use crate::pipeline::orchestrator::CycleOrchestrator;
use crate::pipeline::types::{ApplicationActor, CancelFlag, CycleReport, MailboxSource, Notifier};

/// Everything a cycle needs besides the emails themselves.
pub struct CycleRunner {
    store: Arc<dyn ConfigStore>,
    mailbox: Arc<dyn MailboxSource>,
    llm: LlmSource,
    actor: Arc<dyn ApplicationActor>,
    notifier: Arc<dyn Notifier>,
}

impl CycleRunner {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        mailbox: Arc<dyn MailboxSource>,
        llm: LlmSource,
        actor: Arc<dyn ApplicationActor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            mailbox,
            llm,
            actor,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Load config, fetch one batch, and run it through the pipeline.
    ///
    /// Fails only before any email is touched: missing config, or a
    /// mailbox that cannot be reached. The mailbox is never contacted
    /// without a valid config.
    ///
    /// Afterwards the mailbox is told which emails are finished. Emails
    /// skipped by cancellation or left unclassified come back next cycle.
    pub async fn run_cycle(&self, cancel: &CancelFlag) -> Result<CycleReport, CycleError> {
        let config = self.store.load().await?;
        let llm = self.llm.resolve(&config)?;

        let emails = self.mailbox.fetch_emails(&config).await.map_err(|e| {
            error!(error = %e, "Mailbox fetch failed");
            CycleError::MailboxUnavailable(e)
        })?;
        info!(count = emails.len(), model = llm.model_name(), "Fetched batch");

        let orchestrator = CycleOrchestrator::new(
            Classifier::new(llm),
            ActionExecutor::new(Arc::clone(&self.actor)),
            NotificationDispatcher::new(Arc::clone(&self.notifier)),
        );
        let report = orchestrator.run_cycle(&emails, &config, cancel).await;

        let finished = report.finished_ids();
        if !finished.is_empty()
            && let Err(e) = self.mailbox.acknowledge(&config, &finished).await
        {
            warn!(error = %e, count = finished.len(), "Could not acknowledge emails");
        }
        Ok(report)
    }
}
