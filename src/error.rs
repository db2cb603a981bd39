//! Error types for the opportunity agent.

use std::time::Duration;

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Application error: {0}")]
    Action(#[from] ActionError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Cycle error: {0}")]
    Cycle(#[from] CycleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Agent is not configured (no config at {path})")]
    NotConfigured { path: String },

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Judgment-service (LLM provider) errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-email classification failures. Recovered by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("judgment service unreachable: {0}")]
    Unreachable(#[from] LlmError),

    #[error("judgment service returned non-JSON output: {reason}")]
    NotJson { reason: String },

    #[error("verdict is missing the category field")]
    MissingCategory,

    #[error("verdict has a malformed field: {reason}")]
    Malformed { reason: String },
}

/// Mailbox Source errors. Any of these aborts the whole cycle.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("Authentication failed for {user}")]
    AuthFailed { user: String },

    #[error("Mailbox protocol error: {0}")]
    Protocol(String),

    #[error("Unsupported email provider: {0}")]
    UnsupportedProvider(String),
}

/// Failures inside the Application Actor. Converted into a failed
/// `ActionOutcome` by the executor; never escapes it.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("invalid application URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("application request failed: {0}")]
    RequestFailed(String),

    #[error("application rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("application actor crashed: {0}")]
    Crashed(String),
}

/// Notifier errors. Degraded to a warning by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Malformed destination: {0:?}")]
    InvalidDestination(String),

    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    #[error("Notifier rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Cycle-level errors: the only failures that prevent a report.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Not configured: {0}")]
    NotConfigured(#[from] ConfigError),

    #[error("Mailbox unavailable: {0}")]
    MailboxUnavailable(#[from] MailboxError),

    #[error("Another cycle is already running")]
    Busy,
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
