// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use std::{env, sync::Arc};
use zai_proxy_node::{
    api::{start_server, AppState},
    billing::BillingOrchestrator,
    config::NodeConfig,
    maintenance,
    registry::ModelRegistry,
    upstream::{AsyncEngine, PollConfig, SyncEngine, Transport},
    SupabaseClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    match dotenv::dotenv() {
        Ok(_) => {}
        Err(_) => tracing::debug!("no .env file found, using system environment"),
    }

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let missing = NodeConfig::missing_required();
    if !missing.is_empty() {
        tracing::error!(
            "missing required environment variables: {} - billing path will be unavailable",
            missing.join(", ")
        );
    }

    let config = NodeConfig::from_env();
    let state = build_state(&config)?;

    if state.orchestrator.is_some() {
        tracing::info!("account service connected, billing path ready");
    }

    start_server(state, config.port).await
}

/// Wire the orchestrator when the environment is complete; otherwise the
/// node serves with an explicit unavailable state instead of a nullable
/// global handle.
fn build_state(config: &NodeConfig) -> Result<AppState> {
    if !config.accounts_ready() {
        return Ok(AppState { orchestrator: None });
    }

    // accounts_ready() guarantees these are present
    let api_key = config.upstream_api_key.clone().unwrap_or_default();
    let supabase_url = config.supabase_url.clone().unwrap_or_default();
    let service_key = config.supabase_service_key.clone().unwrap_or_default();

    let supabase = Arc::new(
        SupabaseClient::new(&supabase_url, &service_key)
            .map_err(|e| anyhow::anyhow!("account client init failed: {}", e))?,
    );

    let transport = Transport::new(config.upstream_timeout);
    let sync_engine = SyncEngine::new(
        transport.clone(),
        &config.upstream_base_url,
        &api_key,
        supabase.clone(),
    );
    let async_engine = AsyncEngine::new(
        transport,
        &config.upstream_base_url,
        &api_key,
        PollConfig {
            max_attempts: config.poll_max_attempts,
            interval: config.poll_interval,
        },
    );

    let orchestrator = BillingOrchestrator::new(
        ModelRegistry::with_defaults(),
        supabase.clone(),
        supabase.clone(),
        sync_engine,
        async_engine,
    );

    maintenance::spawn_cleanup_task(supabase, config.cleanup_interval);

    Ok(AppState {
        orchestrator: Some(Arc::new(orchestrator)),
    })
}
