//! `inkloom assemble` — Build the prompt context for a chapter cursor.

use super::store;
use inkloom_config::AppConfig;
use inkloom_context::{AssemblyRequest, ContextEngine, QualityReport};

pub struct AssembleOptions {
    pub project: String,
    pub chapter: String,
    pub cursor: Option<usize>,
    pub max_tokens: Option<usize>,
    pub quality: bool,
    pub split: bool,
    pub json: bool,
}

pub async fn run(options: AssembleOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = store::open(&config).await?;
    let engine = ContextEngine::new(store, config.context.clone());

    // Past-the-end cursors are clamped to the chapter length.
    let mut request = AssemblyRequest::new(
        options.project,
        options.chapter,
        options.cursor.unwrap_or(usize::MAX),
    );
    if let Some(max_tokens) = options.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    if options.quality {
        request = request.with_quality_report(true);
    }

    if options.split {
        let pair = engine.assemble_prompt_pair(&request).await?;
        if options.json {
            println!("{}", serde_json::to_string_pretty(&pair)?);
        } else {
            println!("=== system ===\n{}\n\n=== user ===\n{}", pair.system, pair.user);
        }
        return Ok(());
    }

    let prompt = engine.assemble(&request).await?;
    if options.json {
        println!("{}", serde_json::to_string_pretty(&prompt)?);
        return Ok(());
    }

    println!("{}", prompt.context);
    let meta = &prompt.metadata;
    eprintln!(
        "\n— {} / {} tokens ({:.0}%), {}",
        meta.final_tokens,
        meta.budget,
        meta.utilization_pct,
        if meta.compressed {
            format!("compressed from {}", meta.original_tokens)
        } else {
            "uncompressed".to_string()
        }
    );
    if let Some(report) = &prompt.quality {
        print_report(report);
    }

    Ok(())
}

/// Human-readable quality report on stderr.
pub fn print_report(report: &QualityReport) {
    eprintln!("📊 Quality");
    eprintln!("   Overall:    {:>3}/100", report.overall_score);
    eprintln!("   Characters: {:>3}/100", report.character_info_score);
    eprintln!("   World:      {:>3}/100", report.world_building_score);
    eprintln!("   Narrative:  {:>3}/100", report.narrative_coherence_score);
    eprintln!("   Tokens:     {}", report.total_tokens);
    for suggestion in &report.suggestions {
        eprintln!("   💡 {suggestion}");
    }
}
