// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Static model-to-backend routing table with per-model credit costs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which upstream serves a model: request/response or submit-and-poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Sync,
    Async,
}

/// Routing entry for a single model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub backend: BackendKind,
    pub path: String,
    pub cost: u32,
}

impl ModelConfig {
    pub fn new(backend: BackendKind, path: &str, cost: u32) -> Self {
        Self {
            backend,
            path: path.to_string(),
            cost,
        }
    }
}

/// Read-only model registry, fixed at construction.
///
/// Lookup never fails: unknown model names resolve to the default entry.
pub struct ModelRegistry {
    entries: HashMap<String, ModelConfig>,
    default: ModelConfig,
}

impl ModelRegistry {
    pub fn new(entries: HashMap<String, ModelConfig>, default: ModelConfig) -> Self {
        Self { entries, default }
    }

    /// The production routing table
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "gemini-3-pro-image-preview-async".to_string(),
            ModelConfig::new(BackendKind::Async, "/v1/videos", 5),
        );
        entries.insert(
            "gemini-3-pro-image-preview-2k-async".to_string(),
            ModelConfig::new(BackendKind::Async, "/v1/videos", 10),
        );
        entries.insert(
            "gemini-3-pro-image-preview-4k-async".to_string(),
            ModelConfig::new(BackendKind::Async, "/v1/videos", 15),
        );
        entries.insert(
            "gemini-3-pro-image-preview".to_string(),
            ModelConfig::new(BackendKind::Sync, "/v1/images/generations", 5),
        );
        entries.insert(
            "dall-e-3".to_string(),
            ModelConfig::new(BackendKind::Sync, "/v1/images/generations", 20),
        );
        let default = ModelConfig::new(BackendKind::Async, "/v1/videos", 5);
        Self::new(entries, default)
    }

    /// Resolve a model name to its routing entry, falling back to the default
    pub fn resolve(&self, model_name: &str) -> &ModelConfig {
        self.entries.get(model_name).unwrap_or(&self.default)
    }

    pub fn default_entry(&self) -> &ModelConfig {
        &self.default
    }

    pub fn model_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
