//! Character relevance: which roster members matter to the passage being
//! continued, and how they are rendered into the prompt.
//!
//! Character enrichment is optional. A failed roster read is logged and
//! yields no characters; it never fails the assembly.

use crate::mention::{self, LiteralMentionMatcher, MentionMatcher};
use crate::section::{ContextSection, SectionKind, SECTION_SEPARATOR};
use inkloom_core::error::StoreError;
use inkloom_core::narrative::Character;
use inkloom_core::store::NarrativeStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix of the line that opens one character entry.
pub const ENTRY_PREFIX: &str = "- ";
pub const APPEARANCE_LABEL: &str = "Appearance:";
pub const PERSONALITY_LABEL: &str = "Personality:";
pub const BACKGROUND_LABEL: &str = "Background:";
pub const ABILITIES_LABEL: &str = "Abilities:";
pub const RELATIONSHIP_LABEL: &str = "Relationship";

/// Decides which characters are relevant and renders them.
#[derive(Clone)]
pub struct CharacterRelevanceAnalyzer {
    store: Arc<dyn NarrativeStore>,
    matcher: Arc<dyn MentionMatcher>,
}

impl CharacterRelevanceAnalyzer {
    /// Analyzer using the literal, case-insensitive matcher.
    pub fn new(store: Arc<dyn NarrativeStore>) -> Self {
        Self {
            store,
            matcher: Arc::new(LiteralMentionMatcher),
        }
    }

    /// Swap in a different mention matcher.
    pub fn with_matcher(mut self, matcher: Arc<dyn MentionMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Read the project's roster and keep the characters mentioned in
    /// `content` by name or alias. Store failures yield an empty list.
    pub async fn get_relevant_characters(&self, project_id: &str, content: &str) -> Vec<Character> {
        let roster = match self.store.list_characters(project_id).await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(project_id, error = %e, "Character roster unavailable, continuing without characters");
                return Vec::new();
            }
        };

        let total = roster.len();
        let relevant = self.select_relevant(roster, content);
        debug!(project_id, total, relevant = relevant.len(), "Character relevance computed");
        relevant
    }

    /// Filter an already-loaded roster, preserving roster order.
    pub fn select_relevant(&self, roster: Vec<Character>, content: &str) -> Vec<Character> {
        if content.trim().is_empty() {
            return Vec::new();
        }
        roster
            .into_iter()
            .filter(|c| {
                let names = Self::known_names(c);
                !self.matcher.find_mentions(content, &names).is_empty()
            })
            .collect()
    }

    /// The character's name followed by any aliases found in its
    /// descriptions.
    pub fn known_names(character: &Character) -> Vec<String> {
        let mut names = vec![character.name.clone()];
        names.extend(mention::extract_aliases(
            &character.name,
            character.descriptions(),
        ));
        names
    }

    /// Append a characters section to `context`. Integrating no
    /// characters returns `context` unchanged.
    pub fn integrate_characters(context: &str, characters: &[Character]) -> String {
        let Some(section) = Self::render_character_section(characters) else {
            return context.to_string();
        };
        if context.trim().is_empty() {
            return section.text;
        }
        format!("{}{}{}", context.trim_end(), SECTION_SEPARATOR, section.text)
    }

    /// Render the characters section, or `None` for an empty list.
    pub fn render_character_section(characters: &[Character]) -> Option<ContextSection> {
        if characters.is_empty() {
            return None;
        }
        let body = characters
            .iter()
            .map(|c| Self::render_entry(c, characters))
            .collect::<Vec<_>>()
            .join("\n");
        Some(ContextSection::new(SectionKind::Characters, &body))
    }

    /// One character block. Empty fields produce no line at all.
    fn render_entry(character: &Character, cast: &[Character]) -> String {
        let mut demographics: Vec<String> = Vec::new();
        if let Some(age) = character.age {
            demographics.push(format!("age {age}"));
        }
        for tag in [&character.gender, &character.archetype].into_iter().flatten() {
            let tag = tag.trim();
            if !tag.is_empty() {
                demographics.push(tag.to_string());
            }
        }

        let mut lines = vec![if demographics.is_empty() {
            format!("{ENTRY_PREFIX}{}", character.name)
        } else {
            format!("{ENTRY_PREFIX}{} ({})", character.name, demographics.join(", "))
        }];

        for (label, text) in [
            (APPEARANCE_LABEL, &character.appearance),
            (PERSONALITY_LABEL, &character.personality),
            (BACKGROUND_LABEL, &character.background),
        ] {
            let text = one_line(text);
            if !text.is_empty() {
                lines.push(format!("  {label} {text}"));
            }
        }

        let abilities: Vec<&str> = character
            .abilities
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if !abilities.is_empty() {
            lines.push(format!("  {ABILITIES_LABEL} {}", abilities.join(", ")));
        }

        for rel in &character.relationships {
            let target = cast
                .iter()
                .find(|c| c.id == rel.target_id)
                .map(|c| c.name.as_str())
                .unwrap_or(rel.target_id.as_str());
            let description = one_line(&rel.description);
            if description.is_empty() {
                lines.push(format!("  {RELATIONSHIP_LABEL} ({} → {target})", rel.kind));
            } else {
                lines.push(format!(
                    "  {RELATIONSHIP_LABEL} ({} → {target}): {description}",
                    rel.kind
                ));
            }
        }

        lines.join("\n")
    }

    /// Best-effort scan for unregistered character names.
    pub fn detect_new_characters(content: &str) -> Vec<String> {
        mention::detect_name_candidates(content)
    }

    /// New-name candidates in `content` that match nobody on the
    /// project's roster.
    pub async fn detect_unregistered_characters(
        &self,
        project_id: &str,
        content: &str,
    ) -> Result<Vec<String>, StoreError> {
        let roster = self.store.list_characters(project_id).await?;
        Ok(Self::filter_unregistered(
            Self::detect_new_characters(content),
            &roster,
        ))
    }

    /// Drop candidates that overlap a roster name or alias in either
    /// direction ("Lord Varen" is covered by "Varen" and vice versa).
    pub fn filter_unregistered(candidates: Vec<String>, roster: &[Character]) -> Vec<String> {
        let known: Vec<String> = roster.iter().flat_map(Self::known_names).collect();
        candidates
            .into_iter()
            .filter(|candidate| {
                !known.iter().any(|name| {
                    mention::contains_name(candidate, name) || mention::contains_name(name, candidate)
                })
            })
            .collect()
    }
}

/// Collapse internal newlines so a free-text field stays one line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inkloom_core::narrative::{Chapter, NarrativeProject};
    use inkloom_store::InMemoryStore;
    use proptest::prelude::*;

    struct FailingStore;

    #[async_trait]
    impl NarrativeStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn get_project(&self, _id: &str) -> Result<Option<NarrativeProject>, StoreError> {
            Err(StoreError::Storage("disk on fire".into()))
        }

        async fn get_chapter(&self, _id: &str) -> Result<Option<Chapter>, StoreError> {
            Err(StoreError::Storage("disk on fire".into()))
        }

        async fn list_characters(&self, _project_id: &str) -> Result<Vec<Character>, StoreError> {
            Err(StoreError::QueryFailed("disk on fire".into()))
        }
    }

    /// Matches nothing, to prove the matcher is actually consulted.
    struct BlindMatcher;

    impl MentionMatcher for BlindMatcher {
        fn find_mentions(&self, _text: &str, _known_names: &[String]) -> Vec<String> {
            Vec::new()
        }
    }

    async fn roster_store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store
            .insert_character(Character::new("h", "p1", "Hero").with_age(18))
            .await;
        store
            .insert_character(
                Character::new("r", "p1", "Roland").with_background("Deserter. Nickname: Red"),
            )
            .await;
        store
            .insert_character(Character::new("m", "p1", "Mira"))
            .await;
        Arc::new(store)
    }

    #[tokio::test]
    async fn only_mentioned_characters_are_relevant() {
        let analyzer = CharacterRelevanceAnalyzer::new(roster_store().await);
        let found = analyzer
            .get_relevant_characters("p1", "Mira drew her blade.")
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Mira");
    }

    #[tokio::test]
    async fn alias_mention_counts() {
        let analyzer = CharacterRelevanceAnalyzer::new(roster_store().await);
        let found = analyzer
            .get_relevant_characters("p1", "Red spat into the dust.")
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Roland");
    }

    #[tokio::test]
    async fn roster_failure_yields_empty_list() {
        let analyzer = CharacterRelevanceAnalyzer::new(Arc::new(FailingStore));
        assert!(analyzer.get_relevant_characters("p1", "Hero").await.is_empty());
    }

    #[tokio::test]
    async fn custom_matcher_is_used() {
        let analyzer =
            CharacterRelevanceAnalyzer::new(roster_store().await).with_matcher(Arc::new(BlindMatcher));
        assert!(analyzer
            .get_relevant_characters("p1", "Hero and Mira")
            .await
            .is_empty());
    }

    #[test]
    fn integrating_nothing_is_identity() {
        for ctx in ["", "ctx", "[Project]\nName: X\n\n"] {
            assert_eq!(CharacterRelevanceAnalyzer::integrate_characters(ctx, &[]), ctx);
        }
    }

    #[test]
    fn villager_without_abilities_or_relationships() {
        let villager = Character::new("v", "p1", "Villager")
            .with_age(40)
            .with_gender("female");
        let out = CharacterRelevanceAnalyzer::integrate_characters("ctx", &[villager]);
        assert!(out.starts_with("ctx\n\n[Characters]\n"));
        assert!(out.contains("- Villager (age 40, female)"));
        assert!(!out.contains(ABILITIES_LABEL));
        assert!(!out.contains(RELATIONSHIP_LABEL));
        assert!(!out.contains(PERSONALITY_LABEL));
    }

    #[test]
    fn full_entry_renders_every_line() {
        let hero = Character::new("h", "p1", "Hero")
            .with_age(18)
            .with_gender("male")
            .with_archetype("warrior")
            .with_personality("Brash,\n  loyal")
            .with_ability("swordsmanship")
            .with_ability("  ")
            .with_relationship("m", "rival", "Competes for the guild rank")
            .with_relationship("ghost", "haunted by", "");
        let mira = Character::new("m", "p1", "Mira");

        let section = CharacterRelevanceAnalyzer::render_character_section(&[hero, mira]).unwrap();
        let lines: Vec<&str> = section.text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[Characters]",
                "- Hero (age 18, male, warrior)",
                "  Personality: Brash, loyal",
                "  Abilities: swordsmanship",
                "  Relationship (rival → Mira): Competes for the guild rank",
                "  Relationship (haunted by → ghost)",
                "- Mira",
            ]
        );
    }

    #[test]
    fn integrate_into_empty_context_is_just_the_section() {
        let out = CharacterRelevanceAnalyzer::integrate_characters(
            "",
            &[Character::new("m", "p1", "Mira")],
        );
        assert_eq!(out, "[Characters]\n- Mira");
    }

    #[tokio::test]
    async fn unregistered_names_exclude_roster_and_aliases() {
        let analyzer = CharacterRelevanceAnalyzer::new(roster_store().await);
        let found = analyzer
            .detect_unregistered_characters("p1", "Mira and Red met Lord Osric at the gate.")
            .await
            .unwrap();
        assert_eq!(found, vec!["Lord Osric"]);
    }

    #[tokio::test]
    async fn unregistered_detection_propagates_store_errors() {
        let analyzer = CharacterRelevanceAnalyzer::new(Arc::new(FailingStore));
        let result = analyzer.detect_unregistered_characters("p1", "Osric").await;
        assert!(matches!(result, Err(StoreError::QueryFailed(_))));
    }

    #[test]
    fn filter_matches_partial_names_both_ways() {
        let roster = vec![Character::new("v", "p1", "Varen"), Character::new("a", "p1", "Ada Quill")];
        let candidates = vec!["Lord Varen".to_string(), "Ada".to_string(), "Tomas".to_string()];
        assert_eq!(
            CharacterRelevanceAnalyzer::filter_unregistered(candidates, &roster),
            vec!["Tomas"]
        );
    }

    #[test]
    fn detect_new_characters_delegates_to_patterns() {
        let found =
            CharacterRelevanceAnalyzer::detect_new_characters("A stranger called Osric arrived.");
        assert_eq!(found, vec!["Osric"]);
    }

    proptest! {
        #[test]
        fn integrating_nothing_is_identity_for_any_context(ctx in "\\PC{0,400}") {
            prop_assert_eq!(CharacterRelevanceAnalyzer::integrate_characters(&ctx, &[]), ctx);
        }
    }
}
