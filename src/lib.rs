// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod accounts;
pub mod api;
pub mod billing;
pub mod config;
pub mod maintenance;
pub mod multipart;
pub mod registry;
pub mod upstream;

// Re-export main types
pub use accounts::{
    AccountError, AuthenticatedUser, BlobStore, CreditLedger, IdentityProvider, SupabaseClient,
};
pub use api::{AppState, GenerateResponse};
pub use billing::{BillingError, BillingOrchestrator};
pub use config::NodeConfig;
pub use multipart::{MultipartPart, MultipartPayload};
pub use registry::{BackendKind, ModelConfig, ModelRegistry};
pub use upstream::{
    AsyncEngine, GenerationRequest, PollConfig, SyncEngine, Transport, UpstreamError,
};
