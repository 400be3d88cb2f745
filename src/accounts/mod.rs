// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Seams for the external account services: identity resolution, the
//! atomic credit ledger and the blob store. The node consumes these
//! through trait objects so the billing path can be exercised against
//! in-memory fakes.

pub mod supabase;

pub use supabase::SupabaseClient;

use async_trait::async_trait;
use thiserror::Error;

/// Failures at the account-service boundary.
///
/// The first three map to caller-facing 401/403/402 and never have side
/// effects to reverse.
#[derive(Debug, Clone, Error)]
pub enum AccountError {
    #[error("no bearer token provided")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("insufficient credits")]
    InsufficientCredit,

    #[error("account service unavailable")]
    Unavailable,

    #[error("account service error: {0}")]
    Api(String),
}

/// A caller resolved from a bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
}

/// Token-to-user resolution
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_user(&self, token: &str) -> Result<AuthenticatedUser, AccountError>;
}

/// Atomic credit operations. Correctness under concurrent access rests on
/// the ledger's own compare-and-subtract; the node never locks balances.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Atomically debit `amount`; `InsufficientCredit` when the balance
    /// cannot cover it.
    async fn debit(&self, user_id: &str, amount: u32) -> Result<(), AccountError>;

    /// Compensating credit of a previously debited amount
    async fn credit(&self, user_id: &str, amount: u32) -> Result<(), AccountError>;
}

/// Object storage for persisted generation results
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AccountError>;

    fn public_url(&self, path: &str) -> String;

    /// Immediate children of a prefix (folder names or file names)
    async fn list(&self, prefix: &str) -> Result<Vec<String>, AccountError>;

    async fn remove(&self, paths: &[String]) -> Result<(), AccountError>;
}
