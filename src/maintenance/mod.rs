// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scheduled cleanup of temporary generation results in the blob store

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::accounts::{AccountError, BlobStore};

const TEMP_ROOT: &str = "temp";
const PLACEHOLDER: &str = ".emptyFolderPlaceholder";

/// Spawn the periodic sweep. Errors are logged and the loop keeps going.
pub fn spawn_cleanup_task(blob_store: Arc<dyn BlobStore>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // Skip the immediate first tick; the store was just serving traffic.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sweep_temp(blob_store.as_ref()).await {
                Ok(removed) => info!("cleanup sweep removed {} objects", removed),
                Err(e) => error!("cleanup sweep failed: {}", e),
            }
        }
    });
}

/// Remove every file under `temp/<user>/`. Returns the number of objects
/// removed.
pub async fn sweep_temp(blob_store: &dyn BlobStore) -> Result<usize, AccountError> {
    let mut removed = 0;
    let folders = blob_store.list(TEMP_ROOT).await?;
    for folder in folders {
        if folder == PLACEHOLDER {
            continue;
        }
        let prefix = format!("{}/{}", TEMP_ROOT, folder);
        let files = blob_store.list(&prefix).await?;
        if files.is_empty() {
            continue;
        }
        let paths: Vec<String> = files
            .iter()
            .map(|name| format!("{}/{}", prefix, name))
            .collect();
        blob_store.remove(&paths).await?;
        removed += paths.len();
    }
    Ok(removed)
}
