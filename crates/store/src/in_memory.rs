//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use inkloom_core::error::StoreError;
use inkloom_core::narrative::{Chapter, Character, NarrativeProject, ProjectBundle};
use inkloom_core::store::NarrativeStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Records {
    projects: HashMap<String, NarrativeProject>,
    chapters: HashMap<String, Chapter>,
    /// Insertion order is the roster order.
    characters: Vec<Character>,
}

/// A store that keeps every record in process memory.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryStore {
    records: Arc<RwLock<Records>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Records::default())),
        }
    }

    /// Build a store pre-populated with one bundle.
    pub async fn from_bundle(bundle: ProjectBundle) -> Self {
        let store = Self::new();
        store.import_bundle(bundle).await;
        store
    }

    pub async fn insert_project(&self, project: NarrativeProject) {
        let mut records = self.records.write().await;
        records.projects.insert(project.id.clone(), project);
    }

    pub async fn insert_chapter(&self, chapter: Chapter) {
        let mut records = self.records.write().await;
        records.chapters.insert(chapter.id.clone(), chapter);
    }

    /// Insert or replace a character (matched by ID).
    pub async fn insert_character(&self, character: Character) {
        let mut records = self.records.write().await;
        match records.characters.iter_mut().find(|c| c.id == character.id) {
            Some(existing) => *existing = character,
            None => records.characters.push(character),
        }
    }

    pub async fn import_bundle(&self, bundle: ProjectBundle) {
        self.insert_project(bundle.project).await;
        for chapter in bundle.chapters {
            self.insert_chapter(chapter).await;
        }
        for character in bundle.characters {
            self.insert_character(character).await;
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NarrativeStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_project(&self, id: &str) -> Result<Option<NarrativeProject>, StoreError> {
        Ok(self.records.read().await.projects.get(id).cloned())
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, StoreError> {
        Ok(self.records.read().await.chapters.get(id).cloned())
    }

    async fn list_characters(&self, project_id: &str) -> Result<Vec<Character>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .characters
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> ProjectBundle {
        ProjectBundle {
            project: NarrativeProject::new("p1", "Test", "isekai"),
            chapters: vec![Chapter::new("c1", "p1", "Chapter 1", "Para A.")],
            characters: vec![
                Character::new("h", "p1", "Hero").with_age(18),
                Character::new("x", "p2", "Stranger"),
            ],
        }
    }

    #[tokio::test]
    async fn lookups_resolve_imported_records() {
        let store = InMemoryStore::from_bundle(bundle()).await;
        assert_eq!(store.get_project("p1").await.unwrap().unwrap().name, "Test");
        assert_eq!(
            store.get_chapter("c1").await.unwrap().unwrap().title,
            "Chapter 1"
        );
        assert!(store.get_project("missing").await.unwrap().is_none());
        assert!(store.get_chapter("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn characters_filtered_by_project() {
        let store = InMemoryStore::from_bundle(bundle()).await;
        let roster = store.list_characters("p1").await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Hero");
        assert!(store.list_characters("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_character_replaces_by_id() {
        let store = InMemoryStore::from_bundle(bundle()).await;
        store
            .insert_character(Character::new("h", "p1", "Hero").with_age(19))
            .await;
        let roster = store.list_characters("p1").await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].age, Some(19));
    }
}
