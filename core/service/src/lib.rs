pub mod config;
pub mod routes;

pub use config::{ConfigError, ServiceConfig, StoreKind};
pub use routes::{router, AppState};

use anyhow::{Context, Result};
use client_console_store::{RemoteStore, RestStore, SqliteStore};
use std::sync::Arc;
use tracing::info;

/// Open the store selected by the configuration
pub fn open_store(config: &ServiceConfig) -> Result<Arc<dyn RemoteStore>> {
    match config.store {
        StoreKind::Sqlite => {
            let path = config.database_path()?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let store = SqliteStore::new(&path)?;
            info!("Database initialized at: {}", path.display());
            Ok(Arc::new(store))
        }
        StoreKind::Rest => {
            let url = config.rest_url.clone().ok_or(ConfigError::MissingRestUrl)?;
            info!("Using REST store at: {}", url);
            Ok(Arc::new(RestStore::new(url, config.rest_key.clone())))
        }
    }
}
