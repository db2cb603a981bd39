//! Judgment-service integration.
//!
//! The classifier talks to an `LlmProvider`. Production uses the OpenAI
//! chat-completions API with the key from the agent config; tests plug in
//! a fixed provider.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;

use secrecy::SecretString;

use crate::config::AgentConfig;
use crate::error::{ConfigError, LlmError};

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiProvider::new(
        config.api_key.clone(),
        config.model.clone(),
        config.base_url.clone(),
    )?;
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(provider))
}

/// Where a cycle gets its judgment service from.
#[derive(Clone)]
pub enum LlmSource {
    /// Always use this provider.
    Fixed(Arc<dyn LlmProvider>),
    /// Build an OpenAI provider from the cycle's `openaiKey`.
    FromConfig { model: String, base_url: String },
}

impl LlmSource {
    /// Resolve the provider for one cycle.
    pub fn resolve(&self, config: &AgentConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        match self {
            Self::Fixed(provider) => Ok(Arc::clone(provider)),
            Self::FromConfig { model, base_url } => {
                let llm_config = LlmConfig {
                    api_key: config.openai_key.clone(),
                    model: model.clone(),
                    base_url: base_url.clone(),
                };
                create_provider(&llm_config).map_err(|e| ConfigError::InvalidValue {
                    key: "openaiKey".into(),
                    message: e.to_string(),
                })
            }
        }
    }
}
