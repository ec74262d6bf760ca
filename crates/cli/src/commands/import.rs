//! `inkloom import` — Load a project bundle into the SQLite store.

use inkloom_config::AppConfig;
use inkloom_store::{BundleFileStore, SqliteStore};
use std::path::Path;

pub async fn run(bundle_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.store.backend != "sqlite" {
        return Err(format!(
            "Import writes to the sqlite backend, but store.backend is '{}'",
            config.store.backend
        )
        .into());
    }

    let content = tokio::fs::read_to_string(bundle_path)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", bundle_path.display()))?;
    let bundles = BundleFileStore::parse_bundles(&content)?;

    let db_path = config.store.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::new(&db_path.display().to_string()).await?;

    let mut records = 0;
    for bundle in &bundles {
        let written = store.import_bundle(bundle).await?;
        tracing::info!(project_id = %bundle.project.id, records = written, "Bundle imported");
        println!(
            "📥 {} ({}): {} chapters, {} characters",
            bundle.project.name,
            bundle.project.id,
            bundle.chapters.len(),
            bundle.characters.len()
        );
        records += written;
    }

    println!("\n✅ Imported {records} records into {}", db_path.display());
    Ok(())
}
