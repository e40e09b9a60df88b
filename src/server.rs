//! Same-origin relay that keeps the API key server-side.
//!
//! Routes:
//! - GET  /api/health            - Liveness probe
//! - POST /api/generate-response - Generate a reply

use crate::error::{ErrorKind, GenerationError};
use crate::llm_generator::{Generator, RELAY_ROUTE};
use crate::request::GenerationRequest;
use crate::validation::Validator;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub struct RelayState {
    pub generator: Arc<dyn Generator>,
    pub validator: Validator,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

/// Status the relay answers with for a failed generation.
pub fn status_for(err: &GenerationError) -> StatusCode {
    if let Some(status) = err.status.and_then(|s| StatusCode::from_u16(s).ok()) {
        return status;
    }
    match err.kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Network => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, error: String, kind: Option<ErrorKind>) -> Response {
    (status, Json(ErrorResponse { error, kind })).into_response()
}

pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route(RELAY_ROUTE, post(generate_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Server is running",
    })
}

async fn generate_response(
    State(state): State<RelayState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected unreadable request body: {}", rejection.body_text());
            return error_response(
                StatusCode::BAD_REQUEST,
                rejection.body_text(),
                Some(ErrorKind::Validation),
            );
        }
    };

    let errors = state.validator.validate(&request);
    if !errors.is_valid() {
        let missing: Vec<&str> = errors.fields().map(|f| f.as_str()).collect();
        warn!("Rejected request with missing fields: {:?}", missing);
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
            Some(ErrorKind::Validation),
        );
    }

    match state.generator.generate(&request).await {
        Ok(response) => Json(GenerateResponse { response }).into_response(),
        Err(err) => {
            let status = status_for(&err);
            warn!("Relaying failure {} ({}): {}", status, err.kind, err.message);
            error_response(status, err.message, Some(err.kind))
        }
    }
}

/// Binds `port` on all interfaces and serves until the process exits.
pub async fn serve(state: RelayState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://localhost:{}", port);
    info!("Email reply relay ready");
    axum::serve(listener, app).await?;
    Ok(())
}
