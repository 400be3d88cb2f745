// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Synchronous generation engine: single JSON request, result normalized
//! to a URL (persisting inline images through the blob store when needed)

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info};

use crate::accounts::BlobStore;

use super::transport::{RequestBody, Transport};
use super::{GenerationRequest, UpstreamError};

/// Map a symbolic aspect ratio to the pixel dimensions the sync upstream
/// expects. Unrecognized sizes fall back to square.
pub fn map_size(size: Option<&str>) -> &'static str {
    match size {
        Some("16:9") => "1792x1024",
        Some("3:4") => "1024x1792",
        _ => "1024x1024",
    }
}

pub struct SyncEngine {
    transport: Transport,
    base_url: String,
    api_key: String,
    blob_store: Arc<dyn BlobStore>,
}

impl SyncEngine {
    pub fn new(
        transport: Transport,
        base_url: &str,
        api_key: &str,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            blob_store,
        }
    }

    /// Generate one image and return a result URL.
    ///
    /// URL-form results are requested explicitly; upstreams that answer
    /// with `b64_json` anyway get their payload decoded and persisted
    /// under a per-user timestamped path.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        path: &str,
        user_id: &str,
    ) -> Result<String, UpstreamError> {
        let size = map_size(request.size.as_deref());
        let payload = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "size": size,
            "n": 1,
            "response_format": "url",
        });

        let url = format!("{}{}", self.base_url, path);
        debug!("sync generate POST {} (size={})", url, size);

        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )];
        let response = self
            .transport
            .send(Method::POST, &url, &headers, RequestBody::Json(payload))
            .await?;

        let Some(item) = response.get("data").and_then(|d| d.get(0)) else {
            return Err(UpstreamError::UnrecognizedResponse);
        };

        if let Some(direct_url) = item.get("url").and_then(|u| u.as_str()) {
            return Ok(direct_url.to_string());
        }

        if let Some(b64) = item.get("b64_json").and_then(|b| b.as_str()) {
            let bytes = STANDARD
                .decode(b64)
                .map_err(|e| UpstreamError::Storage(format!("invalid b64_json payload: {}", e)))?;
            let file_path = format!(
                "temp/{}/sync_{}.png",
                user_id,
                chrono::Utc::now().timestamp_millis()
            );
            self.blob_store
                .upload(&file_path, bytes, "image/png")
                .await
                .map_err(|e| UpstreamError::Storage(e.to_string()))?;
            let public_url = self.blob_store.public_url(&file_path);
            info!("persisted inline sync result at {}", file_path);
            return Ok(public_url);
        }

        Err(UpstreamError::UnrecognizedResponse)
    }
}
