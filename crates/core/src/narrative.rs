//! Narrative records: projects, chapters, and characters.
//!
//! These are read from a `NarrativeStore` once per assembly request and
//! never mutated by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A writing project: the novel being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeProject {
    /// Unique ID for this project
    pub id: String,

    /// Display name
    pub name: String,

    /// Genre/type tag (e.g. "isekai", "mystery")
    #[serde(default)]
    pub genre: String,

    /// Free-text premise and world description
    #[serde(default)]
    pub description: String,

    /// When this project was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl NarrativeProject {
    pub fn new(id: impl Into<String>, name: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            genre: genre.into(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One chapter of a project. Content is plain text addressed by
/// character offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,

    /// Owning project
    pub project_id: String,

    pub title: String,

    #[serde(default)]
    pub content: String,

    /// Position of this chapter within the project (1-based)
    #[serde(default)]
    pub position: u32,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            content: content.into(),
            position: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn at_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }
}

/// A directed relationship from one character to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// The character this edge points at
    pub target_id: String,

    /// Relationship type (e.g. "rival", "mentor")
    pub kind: String,

    #[serde(default)]
    pub description: String,
}

/// A member of a project's character roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,

    pub project_id: String,

    pub name: String,

    /// Archetype/role tag (e.g. "warrior", "mentor")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default)]
    pub appearance: String,

    #[serde(default)]
    pub personality: String,

    #[serde(default)]
    pub background: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Character {
    /// Create a character with only a name; an empty `id` is replaced by
    /// a fresh UUID.
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let mut id = id.into();
        if id.is_empty() {
            id = Uuid::new_v4().to_string();
        }
        Self {
            id,
            project_id: project_id.into(),
            name: name.into(),
            archetype: None,
            age: None,
            gender: None,
            appearance: String::new(),
            personality: String::new(),
            background: String::new(),
            abilities: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_archetype(mut self, archetype: impl Into<String>) -> Self {
        self.archetype = Some(archetype.into());
        self
    }

    pub fn with_appearance(mut self, appearance: impl Into<String>) -> Self {
        self.appearance = appearance.into();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    pub fn with_ability(mut self, ability: impl Into<String>) -> Self {
        self.abilities.push(ability.into());
        self
    }

    pub fn with_relationship(
        mut self,
        target_id: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.relationships.push(Relationship {
            target_id: target_id.into(),
            kind: kind.into(),
            description: description.into(),
        });
        self
    }

    /// The free-text fields, in the order aliases are searched.
    pub fn descriptions(&self) -> [&str; 3] {
        [&self.appearance, &self.personality, &self.background]
    }
}

/// A self-contained export of one project, as read by the bundle file
/// store and the importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectBundle {
    pub project: NarrativeProject,

    #[serde(default)]
    pub chapters: Vec<Chapter>,

    #[serde(default)]
    pub characters: Vec<Character>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_new_generates_id_when_empty() {
        let c = Character::new("", "p1", "Mira");
        assert!(!c.id.is_empty());
        assert_eq!(c.name, "Mira");
    }

    #[test]
    fn bundle_deserializes_with_defaults() {
        let json = r#"{
            "project": {"id": "p1", "name": "Test"},
            "characters": [{"id": "h", "project_id": "p1", "name": "Hero", "age": 18}]
        }"#;
        let bundle: ProjectBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.project.genre, "");
        assert!(bundle.chapters.is_empty());
        assert_eq!(bundle.characters[0].age, Some(18));
        assert!(bundle.characters[0].abilities.is_empty());
    }

    #[test]
    fn empty_collections_skipped_when_serialized() {
        let c = Character::new("h", "p1", "Villager");
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("abilities"));
        assert!(!json.contains("relationships"));
    }
}
