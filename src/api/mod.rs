// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP surface: request/response envelopes and the error mapping

pub mod http_server;

pub use http_server::{build_router, start_server, AppState};

use serde::{Deserialize, Serialize};

use crate::accounts::AccountError;
use crate::billing::BillingError;

/// Success envelope: `{created, data: [{url}]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub created: i64,
    pub data: Vec<GeneratedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub url: String,
}

impl GenerateResponse {
    pub fn single(url: String) -> Self {
        Self {
            created: chrono::Utc::now().timestamp_millis(),
            data: vec![GeneratedItem { url }],
        }
    }
}

/// Caller-facing error with its HTTP status. Serialized as
/// `{error: {message}}`; upstream payloads are never forwarded beyond the
/// bounded excerpt the error message already carries.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(500, "account service unavailable")
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let status = match &err {
            BillingError::Account(AccountError::MissingToken) => 401,
            BillingError::Account(AccountError::InvalidToken) => 403,
            BillingError::Account(AccountError::InsufficientCredit) => 402,
            BillingError::Account(_) => 500,
            BillingError::Generation(_) => 500,
        };
        Self::new(status, err.to_string())
    }
}
