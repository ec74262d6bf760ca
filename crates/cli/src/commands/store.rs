//! Opening the configured narrative store.

use inkloom_config::AppConfig;
use inkloom_core::store::NarrativeStore;
use inkloom_store::{BundleFileStore, InMemoryStore, SqliteStore};
use std::sync::Arc;

/// Open the backend named by `store.backend`.
pub async fn open(config: &AppConfig) -> Result<Arc<dyn NarrativeStore>, Box<dyn std::error::Error>> {
    let path = config.store.resolved_path();
    let store: Arc<dyn NarrativeStore> = match config.store.backend.as_str() {
        "sqlite" => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStore::new(&path.display().to_string()).await?)
        }
        "bundle" => Arc::new(BundleFileStore::open(&path).await?),
        "memory" => {
            tracing::warn!("Using the in-memory store: nothing has been imported, every lookup will miss");
            Arc::new(InMemoryStore::new())
        }
        other => return Err(format!("Unknown store backend: {other}").into()),
    };
    tracing::debug!(backend = store.name(), path = %path.display(), "Narrative store opened");
    Ok(store)
}
