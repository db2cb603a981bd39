//! Log-only notifier for running without a messaging account.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::pipeline::types::Notifier;

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(destination = %destination, message = %message, "Notification (log only)");
        Ok(())
    }
}
