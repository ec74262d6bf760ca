//! `inkloom analyze` — Score a context file.

use super::assemble::print_report;
use inkloom_context::QualityAnalyzer;
use std::path::Path;

pub async fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let context = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;

    let report = QualityAnalyzer::new().analyze_context_quality(&context);
    print_report(&report);
    Ok(())
}
