// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Clients for the generation upstreams: one-shot transport, the
//! synchronous image engine and the asynchronous submit-and-poll engine.

pub mod async_engine;
pub mod sync_engine;
pub mod transport;

pub use async_engine::{AsyncEngine, PollConfig};
pub use sync_engine::SyncEngine;
pub use transport::{RequestBody, Transport};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An inbound generation request, constructed once per call.
/// Each entry of `images` is expected to be a `data:` URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Errors raised while talking to a generation upstream.
///
/// `Transport`, `Rejected` and `NonJsonBody` are deliberately distinct:
/// the poll loop treats all three as transient while the orchestrator
/// reports them differently.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned non-JSON body: {excerpt}")]
    NonJsonBody { excerpt: String },

    #[error("upstream rejected request [{status}]: {body}")]
    Rejected { status: u16, body: String },

    #[error("submission accepted but no task id in response: {0}")]
    NoTaskId(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("generation timed out after {attempts} poll attempts")]
    Timeout { attempts: u32 },

    #[error("unrecognized upstream response shape")]
    UnrecognizedResponse,

    #[error("failed to persist generated image: {0}")]
    Storage(String),
}
