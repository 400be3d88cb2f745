// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Asynchronous generation engine: multipart task submission followed by
//! a bounded polling loop.
//!
//! Task lifecycle as seen from here: submitted, then queued/processing on
//! the upstream side, then completed or failed. A caller-side timeout is
//! the third terminal outcome, reached when the attempt budget runs out.

use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::multipart::{attachments_from_data_uris, MultipartPayload};

use super::transport::{RequestBody, Transport};
use super::{GenerationRequest, UpstreamError};

/// Poll budget. Defaults bound the total wait to 120s; tests shrink both
/// to keep wall-clock time down without touching the loop logic.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(2),
        }
    }
}

pub struct AsyncEngine {
    transport: Transport,
    base_url: String,
    api_key: String,
    poll: PollConfig,
}

impl AsyncEngine {
    pub fn new(transport: Transport, base_url: &str, api_key: &str, poll: PollConfig) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            poll,
        }
    }

    /// Submit a task and poll it to a terminal outcome
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        path: &str,
    ) -> Result<String, UpstreamError> {
        let task_id = self.submit(request, path).await?;
        info!("async task {} submitted, polling", task_id);
        self.poll_task(path, &task_id).await
    }

    /// Encode the request as multipart and exchange it for a task id
    async fn submit(
        &self,
        request: &GenerationRequest,
        path: &str,
    ) -> Result<String, UpstreamError> {
        let size = request.size.clone().unwrap_or_else(|| "16:9".to_string());
        let fields = [
            ("model", request.model.clone()),
            ("prompt", request.prompt.clone()),
            ("size", size),
        ];
        let files = match &request.images {
            Some(images) => attachments_from_data_uris(images),
            None => Vec::new(),
        };
        let payload = MultipartPayload::encode(&fields[..], &files);
        debug!(
            "submitting multipart payload: {} bytes, {} attachments",
            payload.content_length(),
            files.len()
        );

        let url = format!("{}{}", self.base_url, path);
        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )];
        let response = self
            .transport
            .send(
                Method::POST,
                &url,
                &headers,
                RequestBody::Multipart {
                    content_type: payload.content_type(),
                    body: payload.body,
                },
            )
            .await?;

        extract_task_id(&response)
            .ok_or_else(|| UpstreamError::NoTaskId(response.to_string()))
    }

    /// The polling state machine. Transient failures (network errors,
    /// non-2xx, unparseable bodies) consume an attempt and continue; only
    /// an upstream terminal status or budget exhaustion ends the loop.
    async fn poll_task(&self, path: &str, task_id: &str) -> Result<String, UpstreamError> {
        let url = format!("{}{}/{}", self.base_url, path, task_id);
        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )];

        let mut attempts = 0;
        while attempts < self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;
            attempts += 1;

            let status_data = match self
                .transport
                .send(Method::GET, &url, &headers, RequestBody::Empty)
                .await
            {
                Ok(value) => value,
                Err(err) => {
                    debug!(
                        "poll attempt {}/{} for task {} transient failure: {}",
                        attempts, self.poll.max_attempts, task_id, err
                    );
                    continue;
                }
            };

            match status_data.get("status").and_then(|s| s.as_str()) {
                Some("completed") | Some("succeeded") => {
                    info!("task {} completed after {} attempts", task_id, attempts);
                    return extract_result_url(&status_data)
                        .ok_or(UpstreamError::UnrecognizedResponse);
                }
                Some("failed") => {
                    warn!("task {} reported failure", task_id);
                    return Err(UpstreamError::GenerationFailed(status_data.to_string()));
                }
                _ => continue,
            }
        }

        Err(UpstreamError::Timeout { attempts })
    }
}

/// Task id from either of the two known submission response shapes:
/// top-level `id` or nested `data.id`
fn extract_task_id(response: &Value) -> Option<String> {
    response
        .get("id")
        .and_then(|v| v.as_str())
        .or_else(|| {
            response
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(|v| v.as_str())
        })
        .map(|s| s.to_string())
}

/// First non-empty result field, in priority order: explicit media URL,
/// generic URL, first entry of the images list
fn extract_result_url(status_data: &Value) -> Option<String> {
    if let Some(url) = status_data.get("video_url").and_then(|v| v.as_str()) {
        if !url.is_empty() {
            return Some(url.to_string());
        }
    }
    if let Some(url) = status_data.get("url").and_then(|v| v.as_str()) {
        if !url.is_empty() {
            return Some(url.to_string());
        }
    }
    status_data
        .get("images")
        .and_then(|imgs| imgs.get(0))
        .and_then(|first| first.get("url"))
        .and_then(|v| v.as_str())
        .filter(|url| !url.is_empty())
        .map(|url| url.to_string())
}
