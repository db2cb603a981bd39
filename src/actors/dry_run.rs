//! Dry-run actor: records the intended application in the log and
//! reports success without contacting the opportunity site.

use async_trait::async_trait;
use tracing::info;

use crate::actors::http::render_cover_letter;
use crate::error::ActionError;
use crate::pipeline::types::{ApplicationActor, ApplicationRequest};

#[derive(Debug, Default)]
pub struct DryRunActor;

#[async_trait]
impl ApplicationActor for DryRunActor {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn submit(&self, request: &ApplicationRequest) -> Result<(), ActionError> {
        info!(
            id = %request.email_id,
            category = %request.category,
            url = %request.action_url,
            applicant = %request.applicant_email,
            cover_letter_chars = render_cover_letter(request).chars().count(),
            "Dry run: would submit application"
        );
        Ok(())
    }
}
