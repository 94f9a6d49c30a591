// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use tracing::info;

use crate::config::PizzaHuntConfig;
use crate::storage::{DocumentStore, InMemoryStore, SqlStore, StorageError};

/// Shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Build the store named by `config.database_url`, or an in-memory one.
    pub async fn from_config(config: &PizzaHuntConfig) -> Result<Self, StorageError> {
        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => Arc::new(SqlStore::new(url).await?),
            None => {
                info!("No database URL configured, using in-memory store");
                Arc::new(InMemoryStore::new())
            }
        };
        Ok(Self::new(store))
    }
}
