//! `inkloom detect` / `inkloom check` — Roster checks for a passage.

use super::store;
use inkloom_config::AppConfig;
use inkloom_context::{ContextEngine, IssueSeverity};
use std::path::Path;

async fn load(
    file: &Path,
) -> Result<(ContextEngine, String), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let store = store::open(&config).await?;
    Ok((ContextEngine::new(store, config.context), content))
}

pub async fn run(project: &str, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, content) = load(file).await?;
    let names = engine.detect_unregistered_characters(project, &content).await?;

    if names.is_empty() {
        println!("No unregistered names found.");
    } else {
        println!("🔍 {} possible new characters:", names.len());
        for name in names {
            println!("   - {name}");
        }
    }
    Ok(())
}

pub async fn check(project: &str, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, content) = load(file).await?;
    let issues = engine.check_consistency(&content, project).await;

    if issues.is_empty() {
        println!("✅ No consistency issues found.");
        return Ok(());
    }
    for issue in &issues {
        let marker = match issue.severity {
            IssueSeverity::Warning => "⚠️ ",
            IssueSeverity::Info => "ℹ️ ",
        };
        println!("{marker} {}", issue.message);
    }
    Ok(())
}
