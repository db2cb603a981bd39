//! Agent service — the one place cycles are started from.
//!
//! Owns the single-cycle guard and the cumulative statistics shown by the
//! dashboard. Both the HTTP API and the poll loop go through here.

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::actors::{DryRunActor, HttpApplicationActor};
use crate::channels::{DemoMailbox, ImapMailbox, LogNotifier, TwilioWhatsAppNotifier};
use crate::config::{
    ApplyMode, ConfigRecord, FileConfigStore, MailboxMode, NotifierSettings, Settings,
};
use crate::error::{ConfigError, CycleError, NotifyError};
use crate::llm::LlmSource;
use crate::pipeline::dispatcher::{NotificationDispatcher, TEST_MESSAGE};
use crate::pipeline::{
    ApplicationActor, CancelFlag, CycleReport, CycleRunner, MailboxSource, Notifier,
};

/// How many rendered log lines the stats keep.
pub const RECENT_LOG_CAPACITY: usize = 50;

/// Running totals across every cycle since start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub emails_processed: usize,
    pub scholarships_applied: usize,
    pub jobs_applied: usize,
    pub notifications: usize,
    /// Newest first, each line prefixed with `[HH:MM:SS]`.
    pub recent_logs: Vec<String>,
}

impl AgentStats {
    fn absorb(&mut self, report: &CycleReport, at: DateTime<Local>) {
        self.emails_processed += report.total_processed;
        self.scholarships_applied += report.scholarship_count;
        self.jobs_applied += report.job_count;
        self.notifications += report.notification_count;

        let stamp = at.format("%H:%M:%S");
        for line in report.log_lines() {
            self.recent_logs.insert(0, format!("[{stamp}] {line}"));
        }
        self.recent_logs.truncate(RECENT_LOG_CAPACITY);
    }
}

pub struct AgentService {
    runner: CycleRunner,
    cycle_guard: Mutex<()>,
    stats: RwLock<AgentStats>,
}

impl AgentService {
    pub fn new(runner: CycleRunner) -> Self {
        Self {
            runner,
            cycle_guard: Mutex::new(()),
            stats: RwLock::new(AgentStats::default()),
        }
    }

    /// Wire the production collaborators chosen by `settings`.
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let store = Arc::new(FileConfigStore::new(settings.config_path.clone()));

        let mailbox: Arc<dyn MailboxSource> = match settings.mailbox {
            MailboxMode::Imap => Arc::new(ImapMailbox::new(settings.mailbox_batch_limit)),
            MailboxMode::Demo => Arc::new(DemoMailbox::new()),
        };

        let actor: Arc<dyn ApplicationActor> = match settings.apply_mode {
            ApplyMode::DryRun => Arc::new(DryRunActor),
            ApplyMode::Http => Arc::new(HttpApplicationActor::new()?),
        };

        let notifier: Arc<dyn Notifier> = match &settings.notifier {
            NotifierSettings::Log => Arc::new(LogNotifier),
            NotifierSettings::Twilio {
                account_sid,
                auth_token,
                from_number,
                base_url,
            } => Arc::new(TwilioWhatsAppNotifier::new(
                account_sid.clone(),
                auth_token.clone(),
                from_number.clone(),
                base_url.clone(),
            )?),
        };

        let llm = LlmSource::FromConfig {
            model: settings.model.clone(),
            base_url: settings.openai_base_url.clone(),
        };

        Ok(Self::new(CycleRunner::new(store, mailbox, llm, actor, notifier)))
    }

    /// Run one cycle unless one is already in progress.
    pub async fn run_cycle(&self, cancel: &CancelFlag) -> Result<CycleReport, CycleError> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            warn!("Cycle requested while another is running");
            return Err(CycleError::Busy);
        };

        let report = self.runner.run_cycle(cancel).await?;
        if report.total_processed > 0 {
            self.stats.write().await.absorb(&report, Local::now());
        }
        Ok(report)
    }

    pub async fn stats(&self) -> AgentStats {
        self.stats.read().await.clone()
    }

    /// Persist a new agent config; the next cycle picks it up.
    pub async fn configure(&self, record: &ConfigRecord) -> Result<(), ConfigError> {
        self.runner.store().save(record).await?;
        info!(provider = %record.email_provider, "Configuration saved");
        Ok(())
    }

    /// Send the fixed test message to `number`.
    pub async fn send_test_notification(&self, number: &str) -> Result<(), NotifyError> {
        let dispatcher = NotificationDispatcher::new(Arc::clone(self.runner.notifier()));
        dispatcher.deliver(number, TEST_MESSAGE).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::config::AgentConfig;
    use crate::error::MailboxError;
    use crate::pipeline::Email;
    use crate::pipeline::testing::{
        MemoryConfigStore, RecordingActor, RecordingNotifier, ScriptedLlm, StaticMailbox,
        test_email, test_record,
    };

    const JOB: &str = r#"{"category": "job", "shouldAct": true, "actionUrl": "https://techcorp.com/apply"}"#;

    fn service_with(
        mailbox: Arc<dyn MailboxSource>,
        notifier: Arc<RecordingNotifier>,
    ) -> AgentService {
        AgentService::new(CycleRunner::new(
            MemoryConfigStore::seeded(test_record()),
            mailbox,
            LlmSource::Fixed(ScriptedLlm::always(JOB)),
            RecordingActor::new(),
            notifier,
        ))
    }

    fn batch(n: usize) -> Vec<Email> {
        (0..n).map(|i| test_email(&i.to_string(), &format!("Opening {i}"))).collect()
    }

    #[test]
    fn absorb_prepends_newest_and_caps() {
        let mut stats = AgentStats::default();
        let mut report = CycleReport::default();
        for i in 0..30 {
            report.record(crate::pipeline::LogEntry {
                email_id: i.to_string(),
                subject: format!("Promo {i}"),
                outcome: crate::pipeline::EmailOutcome::Skipped {
                    reason: crate::pipeline::SkipReason::NotAnOpportunity,
                },
            });
        }
        let at = Local.with_ymd_and_hms(2024, 9, 2, 9, 5, 7).unwrap();

        stats.absorb(&report, at);
        stats.absorb(&report, at);

        assert_eq!(stats.emails_processed, 60);
        assert_eq!(stats.recent_logs.len(), RECENT_LOG_CAPACITY);
        assert_eq!(
            stats.recent_logs[0],
            "[09:05:07] Skipped: Promo 29 (not an opportunity)"
        );
    }

    #[tokio::test]
    async fn cycle_folds_into_stats() {
        let service = service_with(StaticMailbox::with(batch(2)), RecordingNotifier::new());
        service.run_cycle(&CancelFlag::new()).await.unwrap();

        let stats = service.stats().await;
        assert_eq!(stats.emails_processed, 2);
        assert_eq!(stats.jobs_applied, 2);
        assert_eq!(stats.scholarships_applied, 0);
        assert_eq!(stats.notifications, 2);
        assert_eq!(stats.recent_logs.len(), 4);
        assert!(stats.recent_logs[0].ends_with("Notification sent for: Opening 1"));
        assert!(stats.recent_logs[3].ends_with("Applied to job: Opening 0"));
    }

    #[tokio::test]
    async fn empty_cycle_leaves_stats_alone() {
        let service = service_with(StaticMailbox::with(Vec::new()), RecordingNotifier::new());
        let report = service.run_cycle(&CancelFlag::new()).await.unwrap();
        assert_eq!(report.total_processed, 0);
        assert_eq!(service.stats().await, AgentStats::default());
    }

    struct SlowMailbox;

    #[async_trait]
    impl MailboxSource for SlowMailbox {
        async fn fetch_emails(&self, _config: &AgentConfig) -> Result<Vec<Email>, MailboxError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn second_cycle_while_running_is_busy() {
        let service = Arc::new(service_with(Arc::new(SlowMailbox), RecordingNotifier::new()));

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.run_cycle(&CancelFlag::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = service.run_cycle(&CancelFlag::new()).await;
        assert!(matches!(second, Err(CycleError::Busy)));
        assert!(first.await.unwrap().is_ok());

        // Guard released once the first cycle finished.
        assert!(service.run_cycle(&CancelFlag::new()).await.is_ok());
    }

    #[tokio::test]
    async fn configure_persists_record() {
        let store = MemoryConfigStore::empty();
        let service = AgentService::new(CycleRunner::new(
            store.clone(),
            StaticMailbox::with(Vec::new()),
            LlmSource::Fixed(ScriptedLlm::always(JOB)),
            RecordingActor::new(),
            RecordingNotifier::new(),
        ));

        assert!(matches!(
            service.run_cycle(&CancelFlag::new()).await,
            Err(CycleError::NotConfigured(_))
        ));
        service.configure(&test_record()).await.unwrap();
        assert_eq!(store.record().unwrap().email, "me@example.com");
        assert!(service.run_cycle(&CancelFlag::new()).await.is_ok());
    }

    #[tokio::test]
    async fn settings_wiring_reads_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            config_path: dir.path().join("config.json"),
            mailbox: MailboxMode::Demo,
            ..Settings::default()
        };
        let service = AgentService::from_settings(&settings).unwrap();

        assert!(matches!(
            service.run_cycle(&CancelFlag::new()).await,
            Err(CycleError::NotConfigured(_))
        ));
        service.configure(&test_record()).await.unwrap();
        assert!(dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn test_notification_goes_to_number() {
        let notifier = RecordingNotifier::new();
        let service = service_with(StaticMailbox::with(Vec::new()), notifier.clone());

        service.send_test_notification("+1 555 123 4567").await.unwrap();
        assert_eq!(notifier.sent(), vec![("+15551234567".to_string(), TEST_MESSAGE.to_string())]);

        assert!(matches!(
            service.send_test_notification("nope").await,
            Err(NotifyError::InvalidDestination(_))
        ));
    }
}
