// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! One-shot request executor for the generation upstream.
//!
//! Every call builds a fresh client and closes the connection afterwards.
//! Pooled keep-alive connections to this upstream have repeatedly produced
//! intermittent 502/EOF failures, so short-lived connections are a
//! deliberate reliability choice here.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::UpstreamError;

/// Payload for an outgoing upstream request
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Pre-encoded multipart buffer; sent with an explicit Content-Length
    /// because the upstream mishandles chunked bodies.
    Multipart {
        content_type: String,
        body: Bytes,
    },
}

/// Executes a single HTTP request against the generation upstream
#[derive(Debug, Clone)]
pub struct Transport {
    timeout: Duration,
}

impl Transport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Fresh client per request: no idle pool, no connection reuse.
    ///
    /// Certificate validation is disabled for this upstream only; its
    /// certificate chain is known to be non-standard. The account-service
    /// clients build plain clients and must never share this one.
    fn client(&self) -> Result<Client, UpstreamError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(client)
    }

    /// Send one request and parse the response body as JSON.
    ///
    /// The body is always read in full first. A body that fails to parse
    /// yields `NonJsonBody` with a bounded excerpt; a parseable body on a
    /// non-2xx status yields `Rejected`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: RequestBody,
    ) -> Result<Value, UpstreamError> {
        let client = self.client()?;

        let mut header_map = HeaderMap::new();
        header_map.insert(CONNECTION, HeaderValue::from_static("close"));
        for (key, value) in headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                header_map.insert(name, val);
            }
        }

        let mut request = client.request(method.clone(), url).headers(header_map);
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart { content_type, body } => request
                .header(CONTENT_TYPE, content_type)
                .header(CONTENT_LENGTH, body.len())
                .body(body),
        };

        debug!("upstream {} {}", method, url);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => {
                let excerpt: String = text.chars().take(200).collect();
                return Err(UpstreamError::NonJsonBody { excerpt });
            }
        };

        if !status.is_success() {
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body: parsed.to_string(),
            });
        }

        Ok(parsed)
    }
}
