//! Classifier — asks the judgment service whether an email is a
//! scholarship or job offer and parses the verdict.
//!
//! Model output is untrusted input: it is extracted, deserialized into a
//! loose wire shape, then normalized into a [`Verdict`].

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ClassificationError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{Category, Email, Verdict};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 512;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Body characters sent to the model.
const BODY_PREVIEW_CHARS: usize = 4000;

/// Classifies emails through an LLM provider.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify one email. Exactly one judgment-service request per call.
    pub async fn classify(&self, email: &Email) -> Result<Verdict, ClassificationError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(email)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS)
        .with_json_response();

        let response = self.llm.complete(request).await?;

        let verdict = parse_verdict(&response.content).inspect_err(|e| {
            warn!(
                id = %email.id,
                raw_response = %response.content,
                error = %e,
                "Failed to parse verdict"
            );
        })?;

        debug!(
            id = %email.id,
            model = self.llm.model_name(),
            category = %verdict.category,
            should_act = verdict.should_act,
            "Email classified"
        );
        Ok(verdict)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt() -> String {
    "You are an email analyzer. Decide whether an email announces a scholarship \
     opportunity, a job opportunity, or something else.\n\n\
     Respond with ONLY a JSON object of this exact shape:\n\
     {\"category\": \"scholarship\" | \"job\" | \"other\", \"shouldAct\": true | false, \
     \"actionUrl\": \"...\", \"details\": \"...\"}\n\n\
     Rules:\n\
     - \"shouldAct\" is true only if the recipient can apply and the email gives an application link\n\
     - \"actionUrl\" is the application link copied from the email, or \"\" if there is none\n\
     - \"details\" is one or two sentences with the key facts (deadline, amount, role, organization)\n\
     - Use \"other\" for newsletters, receipts, personal mail and anything that is not an opening"
        .to_string()
}

fn build_user_prompt(email: &Email) -> String {
    let body: String = email.body.chars().take(BODY_PREVIEW_CHARS).collect();
    format!(
        "Subject: {}\n\nFrom: {}\n\nBody: {}",
        email.subject, email.sender, body
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Loose wire shape. Aliases cover the field names older prompts used.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    #[serde(default, alias = "type")]
    category: Option<String>,
    #[serde(default, alias = "shouldApply")]
    should_act: Option<bool>,
    #[serde(default, alias = "applicationUrl")]
    action_url: Option<String>,
    #[serde(default, alias = "keyDetails")]
    details: Option<String>,
}

/// Parse model output into a normalized verdict.
pub(crate) fn parse_verdict(raw: &str) -> Result<Verdict, ClassificationError> {
    let json_str = extract_json_object(raw);

    let value: serde_json::Value =
        serde_json::from_str(&json_str).map_err(|e| ClassificationError::NotJson {
            reason: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(ClassificationError::NotJson {
            reason: "expected a JSON object".into(),
        });
    }

    let parsed: RawVerdict =
        serde_json::from_value(value).map_err(|e| ClassificationError::Malformed {
            reason: e.to_string(),
        })?;

    let raw_category = parsed.category.ok_or(ClassificationError::MissingCategory)?;
    let action_url = parsed.action_url.unwrap_or_default().trim().to_string();
    let details = parsed.details.unwrap_or_default().trim().to_string();

    let verdict = match Category::parse(&raw_category) {
        Some(category) => Verdict {
            category,
            should_act: parsed.should_act.unwrap_or(false),
            action_url,
            details,
        },
        None => {
            debug!(category = %raw_category, "Unknown category, treating as other");
            Verdict {
                category: Category::Other,
                should_act: false,
                action_url,
                details,
            }
        }
    };
    Ok(verdict)
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
