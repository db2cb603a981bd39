use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use opportunity_agent::config::{ApplyMode, MailboxMode, NotifierSettings, Settings};
use opportunity_agent::scheduler::spawn_poll_loop;
use opportunity_agent::server;
use opportunity_agent::service::AgentService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid environment configuration")?;

    // Initialize tracing; the guard flushes the file writer on exit.
    let (file_layer, _log_guard) = match &settings.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "opportunity-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("📬 Opportunity Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", settings.model);
    eprintln!("   Config: {}", settings.config_path.display());
    eprintln!(
        "   Mailbox: {}",
        match settings.mailbox {
            MailboxMode::Imap => "imap",
            MailboxMode::Demo => "demo",
        }
    );
    eprintln!(
        "   Apply mode: {}",
        match settings.apply_mode {
            ApplyMode::DryRun => "dry-run",
            ApplyMode::Http => "http",
        }
    );
    eprintln!(
        "   Notifier: {}",
        match settings.notifier {
            NotifierSettings::Log => "log",
            NotifierSettings::Twilio { .. } => "twilio",
        }
    );
    eprintln!("   API: http://0.0.0.0:{}/api", settings.port);

    let service = Arc::new(AgentService::from_settings(&settings)?);

    let poll_loop = if settings.autostart {
        eprintln!("   Polling every {}s\n", settings.poll_interval_secs);
        Some(spawn_poll_loop(
            Arc::clone(&service),
            Duration::from_secs(settings.poll_interval_secs),
        ))
    } else {
        eprintln!("   Polling: disabled (trigger cycles via POST /api/process-emails)\n");
        None
    };

    tokio::select! {
        result = server::serve(Arc::clone(&service), settings.port) => {
            result.context("HTTP server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Some((handle, shutdown)) = poll_loop {
        shutdown.cancel();
        let _ = handle.await;
    }

    Ok(())
}
