//! Poll loop: one cycle per tick until shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::CycleError;
use crate::pipeline::CancelFlag;
use crate::service::AgentService;

/// Spawn the poll loop.
///
/// Returns the task handle and its shutdown flag. Setting the flag stops
/// the loop and abandons any running cycle between emails.
pub fn spawn_poll_loop(
    service: Arc<AgentService>,
    interval: Duration,
) -> (JoinHandle<()>, CancelFlag) {
    let shutdown = CancelFlag::new();
    let shutdown_flag = shutdown.clone();

    let handle = tokio::spawn(async move {
        info!("Poll loop started, running a cycle every {}s", interval.as_secs());
        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;

            if shutdown.is_cancelled() {
                info!("Poll loop shutting down");
                return;
            }

            match service.run_cycle(&shutdown).await {
                Ok(report) if report.total_processed > 0 => info!(
                    processed = report.total_processed,
                    scholarships = report.scholarship_count,
                    jobs = report.job_count,
                    "Scheduled cycle finished"
                ),
                Ok(_) => debug!("Scheduled cycle found nothing new"),
                Err(CycleError::NotConfigured(e)) => debug!(error = %e, "Skipping cycle"),
                Err(CycleError::Busy) => debug!("Skipping tick, cycle already running"),
                Err(e) => error!(error = %e, "Scheduled cycle failed"),
            }
        }
    });

    (handle, shutdown_flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmSource;
    use crate::pipeline::CycleRunner;
    use crate::pipeline::testing::{
        MemoryConfigStore, RecordingActor, RecordingNotifier, ScriptedLlm, StaticMailbox,
        test_email, test_record,
    };

    #[tokio::test]
    async fn loop_runs_cycles_until_shutdown() {
        let mailbox = StaticMailbox::with(vec![test_email("1", "Promo")]);
        let service = Arc::new(AgentService::new(CycleRunner::new(
            MemoryConfigStore::seeded(test_record()),
            mailbox.clone(),
            LlmSource::Fixed(ScriptedLlm::always(r#"{"category": "other", "shouldAct": false}"#)),
            RecordingActor::new(),
            RecordingNotifier::new(),
        )));

        let (handle, shutdown) = spawn_poll_loop(Arc::clone(&service), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("poll loop should stop")
            .unwrap();

        let fetches = mailbox.fetches();
        assert!(fetches >= 1);
        let processed = service.stats().await.emails_processed;
        assert!(processed <= fetches && processed + 1 >= fetches);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(mailbox.fetches(), fetches);
    }

    #[tokio::test]
    async fn unconfigured_agent_keeps_polling() {
        let mailbox = StaticMailbox::with(Vec::new());
        let service = Arc::new(AgentService::new(CycleRunner::new(
            MemoryConfigStore::empty(),
            mailbox.clone(),
            LlmSource::Fixed(ScriptedLlm::always("{}")),
            RecordingActor::new(),
            RecordingNotifier::new(),
        )));

        let (handle, shutdown) = spawn_poll_loop(service, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mailbox.fetches(), 0);
    }
}
