//! Diagnostic scoring of an assembled context.
//!
//! Scores are advisory. Nothing in the engine refuses a context because it
//! scored low; the report exists so a writer (or a caller) can see why a
//! continuation might go astray.

use crate::compressor::SENTENCE_TERMINATORS;
use crate::mention;
use crate::relevance::{CharacterRelevanceAnalyzer, ENTRY_PREFIX};
use crate::section::{AssembledContext, SectionKind};
use crate::token;
use inkloom_core::narrative::Character;
use inkloom_core::store::NarrativeStore;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

pub const MAX_SCORE: u32 = 100;

/// Quality assessment of one context string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Estimated tokens of the analyzed context
    pub total_tokens: usize,
    pub character_info_score: u32,
    pub world_building_score: u32,
    pub narrative_coherence_score: u32,
    /// Mean of the three sub-scores, rounded
    pub overall_score: u32,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A passage states an age that differs from the registered one.
    AgeMismatch,
    /// A name-like token that matches nobody on the roster.
    UnregisteredCharacter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Info,
    Warning,
}

/// One finding of the consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    /// The character (or candidate name) the issue is about
    pub subject: String,
    pub message: String,
}

static AGE_YEARS_OLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})[\s-]*(?:years?|yrs?)[\s-]*old\b")
        .expect("AGE_YEARS_OLD regex should compile")
});

/// "Mira, 25, ..." style appositive ages.
static AGE_APPOSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r",\s*(\d{1,3})\s*,").expect("AGE_APPOSITIVE regex should compile")
});

static AGE_CJK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3})\s*岁").expect("AGE_CJK regex should compile")
});

/// Scores contexts and checks passages against the roster.
#[derive(Clone, Default)]
pub struct QualityAnalyzer {
    store: Option<Arc<dyn NarrativeStore>>,
}

impl QualityAnalyzer {
    /// Analyzer without store access; `check_consistency` finds nothing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<dyn NarrativeStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Score a context string. Never fails; empty input scores 0.
    pub fn analyze_context_quality(&self, context: &str) -> QualityReport {
        let total_tokens = token::estimate_tokens(context);
        let parsed = AssembledContext::parse(context);

        let character_info_score = character_info_score(&parsed);
        let world_building_score = world_building_score(&parsed);
        let narrative_coherence_score = narrative_coherence_score(&parsed);
        let overall_score =
            (character_info_score + world_building_score + narrative_coherence_score + 1) / 3;

        let mut suggestions = Vec::new();
        if context.trim().is_empty() {
            suggestions.push(
                "Context is empty: check that the project exists and the cursor is inside chapter text"
                    .to_string(),
            );
        }
        if character_info_score < 50 {
            suggestions.push(
                "Add character details (personality, relationships) or mention characters near the cursor"
                    .to_string(),
            );
        }
        if world_building_score < 50 {
            suggestions.push("Describe the setting and genre in the project description".to_string());
        }
        if narrative_coherence_score < 50 {
            suggestions.push(
                "Include more chapter text before the cursor so the continuation has something to follow"
                    .to_string(),
            );
        }

        debug!(
            total_tokens,
            character_info_score,
            world_building_score,
            narrative_coherence_score,
            overall_score,
            "Context quality analyzed"
        );

        QualityReport {
            total_tokens,
            character_info_score,
            world_building_score,
            narrative_coherence_score,
            overall_score,
            suggestions,
        }
    }

    /// Best-effort contradictions between `content` and the project roster.
    ///
    /// Reports stated ages that differ from the registered age (warning)
    /// and name-like tokens that match nobody on the roster (info). A
    /// missing store or a failed read yields no issues.
    pub async fn check_consistency(&self, content: &str, project_id: &str) -> Vec<ConsistencyIssue> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        let roster = match store.list_characters(project_id).await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(project_id, error = %e, "Consistency check skipped, roster unavailable");
                return Vec::new();
            }
        };

        let mut issues = age_mismatches(content, &roster);
        issues.extend(
            CharacterRelevanceAnalyzer::filter_unregistered(
                CharacterRelevanceAnalyzer::detect_new_characters(content),
                &roster,
            )
            .into_iter()
            .map(|name| ConsistencyIssue {
                kind: IssueKind::UnregisteredCharacter,
                severity: IssueSeverity::Info,
                message: format!("\"{name}\" is not on the character roster"),
                subject: name,
            }),
        );

        debug!(project_id, issues = issues.len(), "Consistency check finished");
        issues
    }
}

fn character_info_score(ctx: &AssembledContext) -> u32 {
    let Some(section) = ctx.get(SectionKind::Characters) else {
        return 0;
    };
    let body = section.body();
    let entries = body.lines().filter(|l| l.starts_with(ENTRY_PREFIX)).count() as u32;
    let attributes = body
        .lines()
        .filter(|l| l.starts_with("  ") && !l.trim().is_empty())
        .count() as u32;
    (30 + (10 * entries).min(30) + (5 * attributes).min(40)).min(MAX_SCORE)
}

fn world_building_score(ctx: &AssembledContext) -> u32 {
    let mut score = 0;
    if let Some(project) = ctx.get(SectionKind::Project) {
        score += 25;
        if project.body().lines().any(|l| l.trim_start().starts_with("Genre:")) {
            score += 10;
        }
    }
    if let Some(world) = ctx.get(SectionKind::World) {
        let chars = token::char_len(world.body().trim()) as u32;
        score += 25 + (chars / 20).min(40);
    }
    score.min(MAX_SCORE)
}

fn narrative_coherence_score(ctx: &AssembledContext) -> u32 {
    let mut score = 0;
    if ctx.get(SectionKind::ChapterInfo).is_some() {
        score += 20;
    }
    if let Some(content) = ctx.get(SectionKind::Content) {
        let body = content.body();
        score += 30;
        score += (10 * count_paragraphs(body)).min(30);
        if body.contains(SENTENCE_TERMINATORS) {
            score += 20;
        }
    }
    score.min(MAX_SCORE)
}

/// Blank-line separated blocks with any text in them.
fn count_paragraphs(text: &str) -> u32 {
    let mut count = 0;
    let mut in_paragraph = false;
    for line in text.lines() {
        let blank = line.trim().is_empty();
        if !blank && !in_paragraph {
            count += 1;
        }
        in_paragraph = !blank;
    }
    count
}

fn age_mismatches(content: &str, roster: &[Character]) -> Vec<ConsistencyIssue> {
    let names: Vec<(&Character, Vec<String>)> = roster
        .iter()
        .filter(|c| c.age.is_some())
        .map(|c| (c, CharacterRelevanceAnalyzer::known_names(c)))
        .collect();

    let mut reported = HashSet::new();
    let mut issues = Vec::new();
    let sentences = content.split(|c: char| c == '\n' || SENTENCE_TERMINATORS.contains(&c));

    for sentence in sentences {
        let mentioned: Vec<&(&Character, Vec<String>)> = names
            .iter()
            .filter(|(_, known)| known.iter().any(|n| mention::contains_name(sentence, n)))
            .collect();
        // Attributing an age is only safe when one character is in view.
        let [(character, _)] = mentioned.as_slice() else {
            continue;
        };
        let Some(registered) = character.age else {
            continue;
        };

        for re in [&*AGE_YEARS_OLD, &*AGE_APPOSITIVE, &*AGE_CJK] {
            for caps in re.captures_iter(sentence) {
                let Some(stated) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
                    continue;
                };
                if stated == registered || !reported.insert((character.id.clone(), stated)) {
                    continue;
                }
                issues.push(ConsistencyIssue {
                    kind: IssueKind::AgeMismatch,
                    severity: IssueSeverity::Warning,
                    subject: character.name.clone(),
                    message: format!(
                        "{} is described as {stated} but registered as {registered}",
                        character.name
                    ),
                });
            }
        }
    }

    issues
}
