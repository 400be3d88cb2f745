// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Billing orchestrator: the single external operation of the node.
//!
//! Authenticates the caller, resolves the model's cost server-side,
//! reserves credits through the ledger, dispatches to the sync or async
//! engine and reconciles the reservation with the outcome. The invariant:
//! every successful debit ends either committed (result returned, debit
//! stands) or refunded (exactly one compensating credit).

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::accounts::{AccountError, CreditLedger, IdentityProvider};
use crate::registry::{BackendKind, ModelRegistry};
use crate::upstream::{AsyncEngine, GenerationRequest, SyncEngine, UpstreamError};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Engine failure raised after the reservation was refunded
    #[error(transparent)]
    Generation(#[from] UpstreamError),
}

pub struct BillingOrchestrator {
    registry: ModelRegistry,
    identity: Arc<dyn IdentityProvider>,
    ledger: Arc<dyn CreditLedger>,
    sync_engine: SyncEngine,
    async_engine: AsyncEngine,
}

impl BillingOrchestrator {
    pub fn new(
        registry: ModelRegistry,
        identity: Arc<dyn IdentityProvider>,
        ledger: Arc<dyn CreditLedger>,
        sync_engine: SyncEngine,
        async_engine: AsyncEngine,
    ) -> Self {
        Self {
            registry,
            identity,
            ledger,
            sync_engine,
            async_engine,
        }
    }

    /// Handle one billed generation call and return the result URL.
    ///
    /// Authentication and balance failures happen before any reservation
    /// and need nothing reversed. Once the debit has gone through, any
    /// engine failure triggers exactly one compensating credit; a failure
    /// of the refund itself is logged and not retried.
    pub async fn handle(
        &self,
        token: Option<&str>,
        request: &GenerationRequest,
    ) -> Result<String, BillingError> {
        let token = token.ok_or(AccountError::MissingToken)?;
        let user = self.identity.resolve_user(token).await?;

        // Cost always comes from the resolved registry entry, never from
        // caller input.
        let model_config = self.registry.resolve(&request.model).clone();
        let cost = model_config.cost;

        info!(
            "model={} mode={:?} cost={} user={}",
            request.model,
            model_config.backend,
            cost,
            user.email.as_deref().unwrap_or(&user.id)
        );

        self.ledger.debit(&user.id, cost).await?;

        let outcome = match model_config.backend {
            BackendKind::Async => self.async_engine.generate(request, &model_config.path).await,
            BackendKind::Sync => {
                self.sync_engine
                    .generate(request, &model_config.path, &user.id)
                    .await
            }
        };

        match outcome {
            Ok(result_url) => Ok(result_url),
            Err(err) => {
                error!("generation failed after reservation: {}", err);
                if let Err(refund_err) = self.ledger.credit(&user.id, cost).await {
                    // Accepted gap: a double fault loses the credits. The
                    // refund is not retried or queued.
                    error!(
                        "refund of {} credits for user {} failed: {}",
                        cost, user.id, refund_err
                    );
                }
                Err(BillingError::Generation(err))
            }
        }
    }
}
