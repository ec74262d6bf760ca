//! Context builder: turns a project, a chapter and a cursor into labeled
//! sections.
//!
//! The builder is the only component whose store failures are fatal. A
//! missing project or chapter is reported as `Error::NotFound`; a failed
//! character read only costs the characters section.

use crate::relevance::CharacterRelevanceAnalyzer;
use crate::section::{AssembledContext, ContextSection, SectionKind};
use crate::token;
use inkloom_core::error::{Error, Result};
use inkloom_core::narrative::{Chapter, NarrativeProject};
use inkloom_core::store::NarrativeStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Content shorter than this (in characters) yields no extract.
pub const MIN_EXTRACT_CHARS: usize = 10;

/// Paragraphs kept before the cursor.
pub const RELEVANT_PARAGRAPHS: usize = 3;

/// Display labels for known genre tags. Unknown tags render verbatim.
const GENRE_LABELS: &[(&str, &str)] = &[
    ("isekai", "Isekai (transported to another world)"),
    ("fantasy", "Fantasy"),
    ("xianxia", "Xianxia (cultivation fantasy)"),
    ("wuxia", "Wuxia (martial arts)"),
    ("urban", "Urban fantasy"),
    ("scifi", "Science fiction"),
    ("sci-fi", "Science fiction"),
    ("romance", "Romance"),
    ("mystery", "Mystery"),
    ("horror", "Horror"),
    ("historical", "Historical fiction"),
];

/// The display label for a genre tag.
pub fn genre_label(tag: &str) -> String {
    let tag = tag.trim();
    GENRE_LABELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(tag))
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| tag.to_string())
}

/// Reads narrative records and assembles them into sections.
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn NarrativeStore>,
    relevance: CharacterRelevanceAnalyzer,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn NarrativeStore>) -> Self {
        let relevance = CharacterRelevanceAnalyzer::new(Arc::clone(&store));
        Self { store, relevance }
    }

    /// Use a specific relevance analyzer (e.g. one with a custom matcher).
    pub fn with_relevance(mut self, relevance: CharacterRelevanceAnalyzer) -> Self {
        self.relevance = relevance;
        self
    }

    /// Build the flattened context string.
    pub async fn build_context(
        &self,
        project_id: &str,
        chapter_id: &str,
        cursor_position: usize,
    ) -> Result<String> {
        Ok(self
            .build_sections(project_id, chapter_id, cursor_position)
            .await?
            .render())
    }

    /// Build the typed section list.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when the project or the chapter does not resolve,
    /// `Error::Store` when either read fails.
    pub async fn build_sections(
        &self,
        project_id: &str,
        chapter_id: &str,
        cursor_position: usize,
    ) -> Result<AssembledContext> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::project_not_found(project_id))?;

        let chapter = self
            .store
            .get_chapter(chapter_id)
            .await?
            .ok_or_else(|| Error::chapter_not_found(chapter_id))?;

        if chapter.project_id != project.id {
            warn!(
                project_id,
                chapter_id,
                owner = %chapter.project_id,
                "Chapter belongs to a different project, using it anyway"
            );
        }

        let content = Self::extract_relevant_content(&chapter.content, cursor_position);

        let mention_text = format!("{content}\n{}", chapter.title);
        let characters = self
            .relevance
            .get_relevant_characters(&project.id, &mention_text)
            .await;

        let mut ctx = AssembledContext::new();
        ctx.push(Self::project_section(&project));
        ctx.push(ContextSection::new(SectionKind::World, project.description.trim()));
        if let Some(section) = CharacterRelevanceAnalyzer::render_character_section(&characters) {
            ctx.push(section);
        }
        ctx.push(Self::chapter_section(&chapter));
        if !content.is_empty() {
            ctx.push(ContextSection::new(SectionKind::Content, &content));
        }

        debug!(
            project_id,
            chapter_id,
            cursor_position,
            characters = characters.len(),
            extract_chars = token::char_len(&content),
            sections = ctx.sections().len(),
            "Context sections built"
        );

        Ok(ctx)
    }

    fn project_section(project: &NarrativeProject) -> ContextSection {
        let mut body = format!("Name: {}", project.name);
        if !project.genre.trim().is_empty() {
            body.push_str(&format!("\nGenre: {}", genre_label(&project.genre)));
        }
        ContextSection::new(SectionKind::Project, &body)
    }

    fn chapter_section(chapter: &Chapter) -> ContextSection {
        ContextSection::new(
            SectionKind::ChapterInfo,
            &format!("Title: {}\nPosition: {}", chapter.title, chapter.position),
        )
    }

    /// The text span leading up to `cursor_position` (a character offset).
    ///
    /// Returns `""` when the cursor is 0 or the content is shorter than
    /// `MIN_EXTRACT_CHARS`. The cursor is clamped to the content length.
    /// If the text before the cursor contains blank-line paragraph
    /// boundaries, the last `RELEVANT_PARAGRAPHS` paragraphs are returned
    /// joined by a blank line; otherwise the text before the cursor is
    /// returned as is.
    pub fn extract_relevant_content(content: &str, cursor_position: usize) -> String {
        let total = token::char_len(content);
        if cursor_position == 0 || total < MIN_EXTRACT_CHARS {
            return String::new();
        }

        let prefix = token::take_chars(content, cursor_position.min(total));

        let mut paragraphs: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut has_boundary = false;
        for line in prefix.lines() {
            if line.trim().is_empty() {
                has_boundary = true;
                if !current.is_empty() {
                    paragraphs.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join("\n"));
        }

        if !has_boundary {
            return prefix.to_string();
        }

        let skip = paragraphs.len().saturating_sub(RELEVANT_PARAGRAPHS);
        paragraphs[skip..].join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkloom_core::narrative::Character;
    use inkloom_store::InMemoryStore;
    use proptest::prelude::*;

    const CONTENT: &str = "Para A.\n\nPara B with the hero.";

    async fn test_store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store
            .insert_project(
                NarrativeProject::new("p1", "Test", "isekai")
                    .with_description("A kingdom of floating islands."),
            )
            .await;
        store
            .insert_chapter(Chapter::new("c1", "p1", "Chapter 1", CONTENT))
            .await;
        store
            .insert_character(
                Character::new("h", "p1", "Hero")
                    .with_age(18)
                    .with_gender("male")
                    .with_archetype("warrior"),
            )
            .await;
        store
            .insert_character(Character::new("m", "p1", "Mira").with_age(20))
            .await;
        Arc::new(store)
    }

    #[tokio::test]
    async fn builds_full_context() {
        let builder = ContextBuilder::new(test_store().await);
        let ctx = builder
            .build_context("p1", "c1", CONTENT.chars().count())
            .await
            .unwrap();

        assert!(ctx.contains("Test"));
        assert!(ctx.contains("Isekai (transported to another world)"));
        assert!(ctx.contains("Hero"));
        assert!(ctx.contains("18"));
        assert!(ctx.contains("Chapter 1"));
        assert!(ctx.contains("Para A."));
        assert!(ctx.contains("Para B with the hero."));
        assert!(!ctx.contains("Mira"));
    }

    #[tokio::test]
    async fn sections_come_out_in_kind_order() {
        let builder = ContextBuilder::new(test_store().await);
        let ctx = builder.build_sections("p1", "c1", 100).await.unwrap();
        assert_eq!(ctx.kinds(), SectionKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let builder = ContextBuilder::new(test_store().await);
        let err = builder
            .build_context("does-not-exist", "c1", 5)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("does-not-exist"));
        assert!(err.to_string().contains("Project"));
    }

    #[tokio::test]
    async fn missing_chapter_is_not_found() {
        let builder = ContextBuilder::new(test_store().await);
        let err = builder.build_context("p1", "c9", 5).await.unwrap_err();
        assert!(err.to_string().contains("Chapter not found: c9"));
    }

    #[tokio::test]
    async fn foreign_chapter_is_still_used() {
        let store = test_store().await;
        store
            .insert_chapter(Chapter::new("x1", "p2", "Elsewhere", "Somewhere else entirely."))
            .await;
        let builder = ContextBuilder::new(store);
        let ctx = builder.build_context("p1", "x1", 100).await.unwrap();
        assert!(ctx.contains("Elsewhere"));
    }

    #[tokio::test]
    async fn cursor_at_zero_omits_content_section() {
        let builder = ContextBuilder::new(test_store().await);
        let ctx = builder.build_sections("p1", "c1", 0).await.unwrap();
        assert!(ctx.get(SectionKind::Content).is_none());
        assert!(ctx.get(SectionKind::Characters).is_none());
    }

    #[tokio::test]
    async fn chapter_title_mentions_count() {
        let store = test_store().await;
        store
            .insert_chapter(Chapter::new("c2", "p1", "Mira's Oath", "Nothing here yet, truly."))
            .await;
        let builder = ContextBuilder::new(store);
        let ctx = builder.build_context("p1", "c2", 100).await.unwrap();
        assert!(ctx.contains("- Mira (age 20)"));
    }

    #[test]
    fn genre_labels() {
        assert_eq!(genre_label("isekai"), "Isekai (transported to another world)");
        assert_eq!(genre_label("ISEKAI"), "Isekai (transported to another world)");
        assert_eq!(genre_label("cozy litrpg"), "cozy litrpg");
    }

    #[test]
    fn short_content_yields_nothing() {
        assert_eq!(ContextBuilder::extract_relevant_content("short", 3), "");
    }

    #[test]
    fn zero_cursor_yields_nothing() {
        assert_eq!(ContextBuilder::extract_relevant_content(CONTENT, 0), "");
    }

    #[test]
    fn keeps_last_three_paragraphs() {
        let content = "One.\n\nTwo.\n\nThree.\n\nFour.\n\nFive.";
        let out = ContextBuilder::extract_relevant_content(content, content.len());
        assert_eq!(out, "Three.\n\nFour.\n\nFive.");
    }

    #[test]
    fn cursor_cuts_inside_paragraph() {
        let content = "One.\n\nTwo.\n\nThree is long";
        // Cursor after "Three".
        let out = ContextBuilder::extract_relevant_content(content, 17);
        assert_eq!(out, "One.\n\nTwo.\n\nThree");
    }

    #[test]
    fn no_boundary_returns_prefix() {
        let content = "A single unbroken paragraph of prose.";
        assert_eq!(ContextBuilder::extract_relevant_content(content, 8), "A single");
    }

    #[test]
    fn cursor_past_end_is_clamped() {
        let out = ContextBuilder::extract_relevant_content(CONTENT, 10_000);
        assert_eq!(out, CONTENT);
    }

    #[test]
    fn cursor_counts_characters() {
        let content = "勇者拔出了剑。\n\n魔王笑了起来。";
        // 7 ideographs, two newlines, then 2 more characters.
        let out = ContextBuilder::extract_relevant_content(content, 11);
        assert_eq!(out, "勇者拔出了剑。\n\n魔王");
    }

    proptest! {
        #[test]
        fn zero_cursor_extracts_nothing(content in "\\PC{0,400}") {
            prop_assert_eq!(ContextBuilder::extract_relevant_content(&content, 0), "");
        }

        #[test]
        fn short_chapters_extract_nothing(content in "\\PC{0,9}", cursor in 0usize..50) {
            prop_assert_eq!(ContextBuilder::extract_relevant_content(&content, cursor), "");
        }
    }
}
