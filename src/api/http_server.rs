// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{Json, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::billing::BillingOrchestrator;
use crate::upstream::GenerationRequest;

use super::{ApiError, GenerateResponse};

/// Shared router state. The orchestrator is absent when the account
/// service environment was incomplete at startup; the node still serves
/// and reports the condition per call instead of crashing.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Option<Arc<BillingOrchestrator>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/v1/generate", post(generate_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("proxy node listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "Z-AI Proxy Node running (native multipart mode)"
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::response::Json(json!({
        "status": "ok",
        "accounts": if state.orchestrator.is_some() { "ready" } else { "unavailable" },
    }))
}

async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerationRequest>,
) -> Result<axum::response::Json<GenerateResponse>, ApiErrorResponse> {
    let Some(orchestrator) = state.orchestrator.as_ref() else {
        return Err(ApiErrorResponse(ApiError::unavailable()));
    };

    let request_id = Uuid::new_v4();
    tracing::debug!("request {} for model {}", request_id, request.model);

    let token = bearer_token(&headers);
    let result_url = orchestrator
        .handle(token.as_deref(), &request)
        .await
        .map_err(|e| {
            tracing::warn!("request {} failed: {}", request_id, e);
            ApiErrorResponse(ApiError::from(e))
        })?;

    Ok(axum::response::Json(GenerateResponse::single(result_url)))
}

/// Extract the bearer token from the Authorization header, if any
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw);
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

// Error response wrapper
pub struct ApiErrorResponse(pub ApiError);

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({ "error": { "message": self.0.message } });
        (status, axum::response::Json(body)).into_response()
    }
}
