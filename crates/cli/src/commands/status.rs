//! `inkloom status` — Show the active configuration.

use inkloom_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store_path = config.store.resolved_path();

    println!("Inkloom Status");
    println!("==============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Budget:       {} tokens", config.context.max_context_tokens);
    println!(
        "  Quality:      {}",
        if config.context.include_quality_report { "always" } else { "on request" }
    );
    println!("  Store:        {}", config.store.backend);
    if config.store.backend != "memory" {
        if store_path.exists() {
            let size_kb = std::fs::metadata(&store_path)?.len() as f64 / 1024.0;
            println!("  Store file:   {} ({:.1} KB)", store_path.display(), size_kb);
        } else {
            println!("  Store file:   {} (not created yet)", store_path.display());
        }
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `inkloom onboard` first");
    }

    Ok(())
}
