//! Twilio-backed WhatsApp notifier.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::NotifyError;
use crate::pipeline::types::Notifier;

/// Longest body Twilio accepts for a WhatsApp message.
const WHATSAPP_MAX_BODY: usize = 1600;

/// Sends notifications as WhatsApp messages through Twilio.
pub struct TwilioWhatsAppNotifier {
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    base_url: String,
    client: reqwest::Client,
}

impl TwilioWhatsAppNotifier {
    pub fn new(
        account_sid: String,
        auth_token: SecretString,
        from_number: String,
        base_url: String,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        Ok(Self {
            account_sid,
            auth_token,
            from_number,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

#[async_trait]
impl Notifier for TwilioWhatsAppNotifier {
    fn name(&self) -> &str {
        "twilio-whatsapp"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        let body: String = message.chars().take(WHATSAPP_MAX_BODY).collect();
        let params = [
            ("From", format!("whatsapp:{}", self.from_number)),
            ("To", format!("whatsapp:{destination}")),
            ("Body", body),
        ];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "Twilio rejected WhatsApp message");
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}
