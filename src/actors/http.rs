//! HTTP application actor — posts the application as JSON to the
//! opportunity's action URL.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::ActionError;
use crate::pipeline::types::{ApplicationActor, ApplicationRequest};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Body sent to the action URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationPayload<'a> {
    #[serde(flatten)]
    request: &'a ApplicationRequest,
    cover_letter: String,
}

pub struct HttpApplicationActor {
    client: reqwest::Client,
}

impl HttpApplicationActor {
    pub fn new() -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .timeout(SUBMIT_TIMEOUT)
            .build()
            .map_err(|e| ActionError::RequestFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ApplicationActor for HttpApplicationActor {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, request: &ApplicationRequest) -> Result<(), ActionError> {
        let url = validate_url(&request.action_url)?;
        let payload = ApplicationPayload {
            request,
            cover_letter: render_cover_letter(request),
        };

        let resp = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ActionError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(ActionError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

fn validate_url(raw: &str) -> Result<reqwest::Url, ActionError> {
    let invalid = |reason: String| ActionError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Fill `{{subject}}`, `{{sender}}`, `{{details}}` and `{{email}}` in the
/// applicant's cover letter template.
///
/// One pass over the template: substituted text is never rescanned, and
/// unknown placeholders are left as written.
pub fn render_cover_letter(request: &ApplicationRequest) -> String {
    PLACEHOLDER_RE
        .replace_all(&request.cover_letter_template, |caps: &Captures| {
            match &caps[1] {
                "subject" => request.subject.clone(),
                "sender" => request.sender.clone(),
                "details" => request.details.clone(),
                "email" => request.applicant_email.clone(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}
