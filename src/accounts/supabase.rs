// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Supabase-backed implementations of the account-service seams.
//!
//! These clients use a plain pooled reqwest client with full certificate
//! validation. The relaxed TLS posture of the generation upstream must
//! never leak into this boundary.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{AccountError, AuthenticatedUser, BlobStore, CreditLedger, IdentityProvider};

const STORAGE_BUCKET: &str = "ai-images";

/// Client for the Supabase auth, RPC and storage REST surfaces
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, AccountError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AccountError::Api(format!("failed to build client: {}", e)))?;
        info!("account service client configured: {}", base_url);
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    async fn call_rpc(&self, function: &str, user_id: &str, amount: u32) -> Result<reqwest::Response, AccountError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        self.http
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&json!({ "count": amount, "x_user_id": user_id }))
            .send()
            .await
            .map_err(|e| AccountError::Api(format!("{} call failed: {}", function, e)))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn resolve_user(&self, token: &str) -> Result<AuthenticatedUser, AccountError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| AccountError::Api(format!("auth call failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AccountError::InvalidToken);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AccountError::Api(format!("auth response parse failed: {}", e)))?;

        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or(AccountError::InvalidToken)?
            .to_string();
        let email = body
            .get("email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(AuthenticatedUser { id, email })
    }
}

#[async_trait]
impl CreditLedger for SupabaseClient {
    async fn debit(&self, user_id: &str, amount: u32) -> Result<(), AccountError> {
        let response = self.call_rpc("decrement_credits", user_id, amount).await?;
        if !response.status().is_success() {
            debug!("decrement_credits rejected for user {}", user_id);
            return Err(AccountError::InsufficientCredit);
        }
        Ok(())
    }

    async fn credit(&self, user_id: &str, amount: u32) -> Result<(), AccountError> {
        let response = self.call_rpc("increment_credits", user_id, amount).await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AccountError::Api(format!(
                "increment_credits returned {}",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AccountError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, STORAGE_BUCKET, path);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AccountError::Api(format!("storage upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AccountError::Api(format!(
                "storage upload returned {}",
                status
            )));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, STORAGE_BUCKET, path
        )
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, AccountError> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, STORAGE_BUCKET);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&json!({ "prefix": prefix, "limit": 1000 }))
            .send()
            .await
            .map_err(|e| AccountError::Api(format!("storage list failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AccountError::Api(format!("storage list returned {}", status)));
        }

        let entries: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AccountError::Api(format!("storage list parse failed: {}", e)))?;

        Ok(entries
            .iter()
            .filter_map(|entry| entry.get("name").and_then(|n| n.as_str()))
            .map(|name| name.to_string())
            .collect())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), AccountError> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, STORAGE_BUCKET);
        let response = self
            .http
            .delete(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(|e| AccountError::Api(format!("storage remove failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AccountError::Api(format!(
                "storage remove returned {}",
                status
            )));
        }
        Ok(())
    }
}
