//! The engine façade: one object per store that runs the whole pipeline.
//!
//! ```text
//! build_sections → (characters merged in) → compress → quality (optional)
//! ```
//!
//! The engine holds no mutable state. It is `Send + Sync` and every
//! operation takes `&self`, so one instance can serve concurrent requests.

use crate::builder::ContextBuilder;
use crate::compressor::ContextCompressor;
use crate::mention::MentionMatcher;
use crate::quality::{ConsistencyIssue, QualityAnalyzer, QualityReport};
use crate::relevance::CharacterRelevanceAnalyzer;
use crate::section::SectionKind;
use crate::token;
use inkloom_config::ContextConfig;
use inkloom_core::error::Result;
use inkloom_core::store::NarrativeStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Standing instructions sent as the system message when the caller
/// wants a system/user split.
pub const CONTINUATION_SYSTEM_PROMPT: &str = "You are a fiction co-writer. \
Continue the chapter from exactly where the relevant content ends. \
Stay consistent with the project, world and character notes you are given, \
keep the established point of view, tense and tone, \
and write only the continuation itself.";

/// One assembly request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyRequest {
    pub project_id: String,
    pub chapter_id: String,
    /// Character offset into the chapter content
    pub cursor_position: usize,
    /// Overrides `ContextConfig::max_context_tokens`
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// Overrides `ContextConfig::include_quality_report`
    #[serde(default)]
    pub include_quality: Option<bool>,
}

impl AssemblyRequest {
    pub fn new(
        project_id: impl Into<String>,
        chapter_id: impl Into<String>,
        cursor_position: usize,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            chapter_id: chapter_id.into(),
            cursor_position,
            max_tokens: None,
            include_quality: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_quality_report(mut self, include: bool) -> Self {
        self.include_quality = Some(include);
        self
    }
}

/// What happened during one assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Token budget applied.
    pub budget: usize,
    /// Estimated tokens before compression.
    pub original_tokens: usize,
    /// Estimated tokens of the returned context.
    pub final_tokens: usize,
    /// Whether the context had to be compressed.
    pub compressed: bool,
    /// Sections present before compression, in render order.
    pub sections: Vec<SectionKind>,
    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,
}

/// A finished prompt context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledPrompt {
    pub context: String,
    pub metadata: AssemblyMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
}

/// System/user split of an assembled prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
    pub metadata: AssemblyMetadata,
}

/// Composes builder, relevance analyzer, compressor and quality analyzer
/// over one store.
#[derive(Clone)]
pub struct ContextEngine {
    config: ContextConfig,
    builder: ContextBuilder,
    relevance: CharacterRelevanceAnalyzer,
    compressor: ContextCompressor,
    quality: QualityAnalyzer,
}

impl ContextEngine {
    pub fn new(store: Arc<dyn NarrativeStore>, config: ContextConfig) -> Self {
        let relevance = CharacterRelevanceAnalyzer::new(Arc::clone(&store));
        Self {
            config,
            builder: ContextBuilder::new(Arc::clone(&store)).with_relevance(relevance.clone()),
            relevance,
            compressor: ContextCompressor::new(),
            quality: QualityAnalyzer::with_store(store),
        }
    }

    /// Replace the mention matcher used for character relevance.
    pub fn with_matcher(mut self, matcher: Arc<dyn MentionMatcher>) -> Self {
        self.relevance = self.relevance.with_matcher(matcher);
        self.builder = self.builder.with_relevance(self.relevance.clone());
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Build, compress and optionally score the context for a request.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` for an unknown project or chapter and
    /// `Error::Store` when the store fails to read either.
    pub async fn assemble(&self, request: &AssemblyRequest) -> Result<AssembledPrompt> {
        let budget = request.max_tokens.unwrap_or(self.config.max_context_tokens);
        let with_quality = request
            .include_quality
            .unwrap_or(self.config.include_quality_report);

        let sections = self
            .builder
            .build_sections(&request.project_id, &request.chapter_id, request.cursor_position)
            .await?;

        let original_tokens = token::estimate_tokens(&sections.render());
        let context = self.compressor.compress_sections(&sections, budget);
        let final_tokens = token::estimate_tokens(&context);
        let compressed = original_tokens > budget;

        let utilization_pct = if budget == 0 {
            0.0
        } else {
            (final_tokens as f32 / budget as f32) * 100.0
        };

        info!(
            project_id = %request.project_id,
            chapter_id = %request.chapter_id,
            budget,
            original_tokens,
            final_tokens,
            compressed,
            "Context assembled"
        );

        let quality = with_quality.then(|| self.quality.analyze_context_quality(&context));

        Ok(AssembledPrompt {
            context,
            metadata: AssemblyMetadata {
                budget,
                original_tokens,
                final_tokens,
                compressed,
                sections: sections.kinds(),
                utilization_pct,
            },
            quality,
        })
    }

    /// Assemble and split into the fixed system instructions plus the
    /// per-request context as the user message.
    pub async fn assemble_prompt_pair(&self, request: &AssemblyRequest) -> Result<PromptPair> {
        let prompt = self.assemble(request).await?;
        Ok(PromptPair {
            system: CONTINUATION_SYSTEM_PROMPT.to_string(),
            user: prompt.context,
            metadata: prompt.metadata,
        })
    }

    /// New-name candidates in `content` that nobody on the roster matches.
    pub async fn detect_unregistered_characters(
        &self,
        project_id: &str,
        content: &str,
    ) -> Result<Vec<String>> {
        Ok(self
            .relevance
            .detect_unregistered_characters(project_id, content)
            .await?)
    }

    pub async fn check_consistency(&self, content: &str, project_id: &str) -> Vec<ConsistencyIssue> {
        self.quality.check_consistency(content, project_id).await
    }

    pub fn analyze_context_quality(&self, context: &str) -> QualityReport {
        self.quality.analyze_context_quality(context)
    }
}
