//! Test doubles shared by the pipeline unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::config::{AgentConfig, ConfigRecord, ConfigStore};
use crate::error::{ActionError, ConfigError, LlmError, MailboxError, NotifyError};
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::pipeline::types::{
    ApplicationActor, ApplicationRequest, CancelFlag, Email, MailboxSource, Notifier,
};

pub fn test_email(id: &str, subject: &str) -> Email {
    Email {
        id: id.to_string(),
        subject: subject.to_string(),
        sender: "sender@example.org".to_string(),
        body: format!("Body of message {id}"),
        received_at: Utc::now(),
    }
}

pub fn test_record() -> ConfigRecord {
    ConfigRecord {
        email_provider: "gmail".into(),
        email: "me@example.com".into(),
        email_password: "app-password".into(),
        whatsapp_number: "+15551234567".into(),
        openai_key: "sk-test".into(),
        resume_url: "https://example.com/resume.pdf".into(),
        cover_letter_template: "Dear {{sender}}, re {{subject}}".into(),
    }
}

pub fn test_config() -> AgentConfig {
    AgentConfig::try_from(test_record()).unwrap()
}

// ── LLM ─────────────────────────────────────────────────────────────

enum Script {
    Always(String),
    BySubject(Vec<(String, String)>),
    Fail(String),
}

/// LLM that answers from a script and records every request.
pub struct ScriptedLlm {
    script: Script,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    fn with(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Same response for every email.
    pub fn always(response: &str) -> Arc<Self> {
        Self::with(Script::Always(response.to_string()))
    }

    /// Response picked by the email subject; unscripted subjects fail.
    pub fn by_subject(pairs: &[(&str, &str)]) -> Arc<Self> {
        Self::with(Script::BySubject(
            pairs
                .iter()
                .map(|(s, r)| (s.to_string(), r.to_string()))
                .collect(),
        ))
    }

    /// Every request fails as if the service were unreachable.
    pub fn failing(reason: &str) -> Arc<Self> {
        Self::with(Script::Fail(reason.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.requests.lock().unwrap().push(request);

        let content = match &self.script {
            Script::Always(response) => response.clone(),
            Script::BySubject(pairs) => pairs
                .iter()
                .find(|(subject, _)| prompt.starts_with(&format!("Subject: {subject}\n")))
                .map(|(_, response)| response.clone())
                .ok_or_else(|| LlmError::InvalidResponse {
                    provider: "scripted".into(),
                    reason: "no scripted response".into(),
                })?,
            Script::Fail(reason) => {
                return Err(LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason: reason.clone(),
                });
            }
        };

        Ok(CompletionResponse {
            content,
            input_tokens: 100,
            output_tokens: 50,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

// ── Application actor ───────────────────────────────────────────────

/// Actor that records submissions and fails for chosen email ids.
pub struct RecordingActor {
    fail_ids: Vec<String>,
    cancel_on_submit: Option<CancelFlag>,
    requests: Mutex<Vec<ApplicationRequest>>,
    per_email: Mutex<HashMap<String, usize>>,
}

impl RecordingActor {
    fn build(fail_ids: &[&str], cancel_on_submit: Option<CancelFlag>) -> Arc<Self> {
        Arc::new(Self {
            fail_ids: fail_ids.iter().map(|s| s.to_string()).collect(),
            cancel_on_submit,
            requests: Mutex::new(Vec::new()),
            per_email: Mutex::new(HashMap::new()),
        })
    }

    pub fn new() -> Arc<Self> {
        Self::build(&[], None)
    }

    pub fn failing_for(ids: &[&str]) -> Arc<Self> {
        Self::build(ids, None)
    }

    /// Trips `cancel` while a submission is in flight.
    pub fn cancelling(cancel: CancelFlag) -> Arc<Self> {
        Self::build(&[], Some(cancel))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_for(&self, email_id: &str) -> usize {
        self.per_email
            .lock()
            .unwrap()
            .get(email_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<ApplicationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApplicationActor for RecordingActor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn submit(&self, request: &ApplicationRequest) -> Result<(), ActionError> {
        self.requests.lock().unwrap().push(request.clone());
        *self
            .per_email
            .lock()
            .unwrap()
            .entry(request.email_id.clone())
            .or_insert(0) += 1;

        if let Some(cancel) = &self.cancel_on_submit {
            cancel.cancel();
        }

        if self.fail_ids.contains(&request.email_id) {
            return Err(ActionError::Rejected {
                status: 410,
                body: "posting closed".into(),
            });
        }
        Ok(())
    }
}

// ── Notifier ────────────────────────────────────────────────────────

/// Notifier that records deliveries, or fails every send.
pub struct RecordingNotifier {
    fail: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::SendFailed("destination unreachable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.to_string()));
        Ok(())
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// Mailbox with a fixed batch, or one that is always down. Records
/// acknowledged ids.
pub struct StaticMailbox {
    emails: Option<Vec<Email>>,
    reject_acks: bool,
    fetches: AtomicUsize,
    acknowledged: Mutex<Vec<String>>,
}

impl StaticMailbox {
    fn build(emails: Option<Vec<Email>>, reject_acks: bool) -> Arc<Self> {
        Arc::new(Self {
            emails,
            reject_acks,
            fetches: AtomicUsize::new(0),
            acknowledged: Mutex::new(Vec::new()),
        })
    }

    pub fn with(emails: Vec<Email>) -> Arc<Self> {
        Self::build(Some(emails), false)
    }

    pub fn unavailable() -> Arc<Self> {
        Self::build(None, false)
    }

    /// Serves `emails` but fails every acknowledgement.
    pub fn rejecting_acks(emails: Vec<Email>) -> Arc<Self> {
        Self::build(Some(emails), true)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxSource for StaticMailbox {
    async fn fetch_emails(&self, _config: &AgentConfig) -> Result<Vec<Email>, MailboxError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.emails.clone().ok_or_else(|| MailboxError::Connect {
            host: "imap.example.com".into(),
            reason: "connection refused".into(),
        })
    }

    async fn acknowledge(&self, _config: &AgentConfig, ids: &[String]) -> Result<(), MailboxError> {
        if self.reject_acks {
            return Err(MailboxError::Protocol("STORE failed".into()));
        }
        self.acknowledged.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }
}

// ── Config store ────────────────────────────────────────────────────

/// In-memory config store; starts empty unless seeded.
#[derive(Default)]
pub struct MemoryConfigStore {
    record: Mutex<Option<ConfigRecord>>,
}

impl MemoryConfigStore {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seeded(record: ConfigRecord) -> Arc<Self> {
        Arc::new(Self {
            record: Mutex::new(Some(record)),
        })
    }

    pub fn record(&self) -> Option<ConfigRecord> {
        self.record.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<AgentConfig, ConfigError> {
        let record = self.record().ok_or_else(|| ConfigError::NotConfigured {
            path: "<memory>".into(),
        })?;
        AgentConfig::try_from(record)
    }

    async fn save(&self, record: &ConfigRecord) -> Result<(), ConfigError> {
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }
}
