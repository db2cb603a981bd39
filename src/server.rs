//! HTTP API for the dashboard.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::ConfigRecord;
use crate::error::CycleError;
use crate::pipeline::CancelFlag;
use crate::pipeline::dispatcher::TEST_MESSAGE;
use crate::service::AgentService;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<AgentService>,
}

#[derive(Debug, Deserialize)]
struct TestWhatsAppRequest {
    number: String,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// POST /api/configure
async fn configure(
    State(state): State<ApiState>,
    body: Result<Json<ConfigRecord>, JsonRejection>,
) -> Response {
    let Json(record) = match body {
        Ok(body) => body,
        Err(rejection) => return error_body(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state.service.configure(&record).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to save configuration");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save configuration")
        }
    }
}

/// POST /api/process-emails
///
/// Runs one cycle and returns its display summary. The cycle runs on its
/// own task and completes even if the client goes away.
async fn process_emails(State(state): State<ApiState>) -> Response {
    let service = Arc::clone(&state.service);
    let cycle = tokio::spawn(async move { service.run_cycle(&CancelFlag::new()).await });

    let result = match cycle.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Cycle task failed");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Cycle failed");
        }
    };

    match result {
        Ok(report) => {
            info!(processed = report.total_processed, "Manual cycle finished");
            Json(report.to_response()).into_response()
        }
        Err(CycleError::NotConfigured(e)) => {
            warn!(error = %e, "Cycle requested before configuration");
            error_body(StatusCode::BAD_REQUEST, "Not configured")
        }
        Err(CycleError::MailboxUnavailable(e)) => {
            error!(error = %e, "Mailbox unavailable");
            error_body(StatusCode::BAD_GATEWAY, e.to_string())
        }
        Err(e @ CycleError::Busy) => error_body(StatusCode::CONFLICT, e.to_string()),
    }
}

/// POST /api/test-whatsapp
async fn test_whatsapp(
    State(state): State<ApiState>,
    body: Result<Json<TestWhatsAppRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return error_body(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state.service.send_test_notification(&request.number).await {
        Ok(()) => Json(json!({
            "success": true,
            "message": TEST_MESSAGE,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Test notification failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send test message")
        }
    }
}

/// GET /api/stats
async fn stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.stats().await)
}

async fn health() -> &'static str {
    "ok"
}

/// Build the API router.
pub fn api_routes(service: Arc<AgentService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/configure", post(configure))
        .route("/api/process-emails", post(process_emails))
        .route("/api/test-whatsapp", post(test_whatsapp))
        .route("/api/stats", get(stats))
        .route("/health", get(health))
        .layer(cors)
        .with_state(ApiState { service })
}

/// Bind `port` on all interfaces and serve until the process exits.
pub async fn serve(service: Arc<AgentService>, port: u16) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "HTTP API listening");
    axum::serve(listener, api_routes(service)).await?;
    Ok(())
}
