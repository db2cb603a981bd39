//! Configuration: the per-cycle agent config (Config Store) and the
//! process-level settings read from the environment.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ── Agent config (Config Store payload) ─────────────────────────────

/// Persisted configuration record, exactly as the configuration form
/// submits it. Plain strings; converted into [`AgentConfig`] on load.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    #[serde(default = "default_email_provider")]
    pub email_provider: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_password: String,
    #[serde(default)]
    pub whatsapp_number: String,
    #[serde(default)]
    pub openai_key: String,
    #[serde(default)]
    pub resume_url: String,
    #[serde(default)]
    pub cover_letter_template: String,
}

fn default_email_provider() -> String {
    "gmail".to_string()
}

/// Validated agent configuration handed to the pipeline once per cycle.
///
/// Secrets are wrapped so `Debug` output never leaks them.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub email_provider: String,
    pub email: String,
    pub email_password: SecretString,
    pub whatsapp_number: String,
    pub openai_key: SecretString,
    pub resume_url: String,
    pub cover_letter_template: String,
}

impl TryFrom<ConfigRecord> for AgentConfig {
    type Error = ConfigError;

    fn try_from(record: ConfigRecord) -> Result<Self, Self::Error> {
        if record.openai_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "openaiKey".into(),
                hint: "An OpenAI API key is needed to classify emails.".into(),
            });
        }

        Ok(Self {
            email_provider: record.email_provider.trim().to_lowercase(),
            email: record.email.trim().to_string(),
            email_password: SecretString::from(record.email_password),
            whatsapp_number: record.whatsapp_number.trim().to_string(),
            openai_key: SecretString::from(record.openai_key.trim().to_string()),
            resume_url: record.resume_url.trim().to_string(),
            cover_letter_template: record.cover_letter_template,
        })
    }
}

// ── Config Store ────────────────────────────────────────────────────

/// Where the agent config lives between cycles.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load and validate the config. Absence is `ConfigError::NotConfigured`.
    async fn load(&self) -> Result<AgentConfig, ConfigError>;

    /// Persist a new config record, replacing any previous one.
    async fn save(&self, record: &ConfigRecord) -> Result<(), ConfigError>;
}

/// JSON file Config Store.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<AgentConfig, ConfigError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotConfigured {
                    path: self.path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let record: ConfigRecord =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        AgentConfig::try_from(record)
    }

    async fn save(&self, record: &ConfigRecord) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        tokio::fs::write(&self.path, json).await?;

        // Credentials live in this file.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tracing::info!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}

// ── Process settings ────────────────────────────────────────────────

/// Which Mailbox Source the binary wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxMode {
    Imap,
    Demo,
}

/// Which Application Actor the binary wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    DryRun,
    Http,
}

/// Which Notifier the binary wires in.
#[derive(Debug, Clone)]
pub enum NotifierSettings {
    Log,
    Twilio {
        account_sid: String,
        auth_token: SecretString,
        from_number: String,
        base_url: String,
    },
}

/// Process-level settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub config_path: PathBuf,
    pub poll_interval_secs: u64,
    pub autostart: bool,
    pub model: String,
    pub openai_base_url: String,
    pub mailbox: MailboxMode,
    pub mailbox_batch_limit: usize,
    pub apply_mode: ApplyMode,
    pub notifier: NotifierSettings,
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3000,
            config_path: PathBuf::from("./config.json"),
            poll_interval_secs: 30,
            autostart: true,
            model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            mailbox: MailboxMode::Imap,
            mailbox_batch_limit: 20,
            apply_mode: ApplyMode::DryRun,
            notifier: NotifierSettings::Log,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(var("AGENT_PORT"), "AGENT_PORT", defaults.port)?;
        let poll_interval_secs = parse_or(
            var("AGENT_POLL_INTERVAL_SECS"),
            "AGENT_POLL_INTERVAL_SECS",
            defaults.poll_interval_secs,
        )?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_POLL_INTERVAL_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }
        let autostart = parse_or(var("AGENT_AUTOSTART"), "AGENT_AUTOSTART", defaults.autostart)?;
        let mailbox_batch_limit = parse_or(
            var("AGENT_MAILBOX_BATCH_LIMIT"),
            "AGENT_MAILBOX_BATCH_LIMIT",
            defaults.mailbox_batch_limit,
        )?;

        let mailbox = match var("AGENT_MAILBOX").as_deref().map(str::trim) {
            None | Some("imap") => MailboxMode::Imap,
            Some("demo") => MailboxMode::Demo,
            Some(other) => return Err(invalid_mode("AGENT_MAILBOX", other, "imap, demo")),
        };

        let apply_mode = match var("AGENT_APPLY_MODE").as_deref().map(str::trim) {
            None | Some("dry-run") => ApplyMode::DryRun,
            Some("http") => ApplyMode::Http,
            Some(other) => return Err(invalid_mode("AGENT_APPLY_MODE", other, "dry-run, http")),
        };

        let notifier = match var("AGENT_NOTIFIER").as_deref().map(str::trim) {
            None | Some("log") => NotifierSettings::Log,
            Some("twilio") => {
                let required = |key: &str| {
                    var(key).ok_or_else(|| ConfigError::MissingRequired {
                        key: key.to_string(),
                        hint: "Required when AGENT_NOTIFIER=twilio.".into(),
                    })
                };
                NotifierSettings::Twilio {
                    account_sid: required("TWILIO_ACCOUNT_SID")?,
                    auth_token: SecretString::from(required("TWILIO_AUTH_TOKEN")?),
                    from_number: required("TWILIO_WHATSAPP_FROM")?,
                    base_url: var("TWILIO_BASE_URL")
                        .unwrap_or_else(|| "https://api.twilio.com".to_string()),
                }
            }
            Some(other) => return Err(invalid_mode("AGENT_NOTIFIER", other, "log, twilio")),
        };

        Ok(Self {
            port,
            config_path: var("AGENT_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            poll_interval_secs,
            autostart,
            model: var("AGENT_MODEL").unwrap_or(defaults.model),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            mailbox,
            mailbox_batch_limit,
            apply_mode,
            notifier,
            log_dir: var("AGENT_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn invalid_mode(key: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("unknown mode {value:?} (expected one of: {expected})"),
    }
}
