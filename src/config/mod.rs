// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-driven node configuration

use std::env;
use std::time::Duration;

/// Variables the node cannot bill without. Missing entries are reported at
/// startup and the node serves with the account path marked unavailable.
pub const REQUIRED_ENV: &[&str] = &["API_KEY", "SUPABASE_URL", "SUPABASE_SERVICE_KEY"];

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub port: u16,
    pub upstream_base_url: String,
    pub upstream_api_key: Option<String>,
    pub upstream_timeout: Duration,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
    pub poll_max_attempts: u32,
    pub poll_interval: Duration,
    pub cleanup_interval: Duration,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let upstream_base_url =
            env::var("UPSTREAM_BASE_URL").unwrap_or_else(|_| "https://api.tu-zi.com".to_string());
        let upstream_timeout = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));
        let poll_max_attempts = env::var("POLL_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let poll_interval = env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(2));
        let cleanup_interval = env::var("CLEANUP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(24 * 60 * 60));

        Self {
            port,
            upstream_base_url,
            upstream_api_key: env::var("API_KEY").ok(),
            upstream_timeout,
            supabase_url: env::var("SUPABASE_URL").ok(),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY").ok(),
            poll_max_attempts,
            poll_interval,
            cleanup_interval,
        }
    }

    /// Names of required variables that are absent from the environment
    pub fn missing_required() -> Vec<&'static str> {
        REQUIRED_ENV
            .iter()
            .filter(|key| env::var(key).is_err())
            .copied()
            .collect()
    }

    /// True when every account-path credential is present
    pub fn accounts_ready(&self) -> bool {
        self.upstream_api_key.is_some()
            && self.supabase_url.is_some()
            && self.supabase_service_key.is_some()
    }
}
