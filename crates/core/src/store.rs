//! Store trait — the read-only persistence boundary of the engine.
//!
//! The engine issues exactly three queries and never writes. Adapters
//! (in-memory, bundle file, SQLite) live in `inkloom-store`.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::narrative::{Chapter, Character, NarrativeProject};

/// Read access to projects, chapters, and character rosters.
#[async_trait]
pub trait NarrativeStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory", "bundle").
    fn name(&self) -> &str;

    /// Fetch a project by ID. `Ok(None)` when it does not exist.
    async fn get_project(&self, id: &str) -> Result<Option<NarrativeProject>, StoreError>;

    /// Fetch a chapter (with content and title) by ID.
    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, StoreError>;

    /// Fetch every character of a project, with attributes and relationships.
    async fn list_characters(&self, project_id: &str) -> Result<Vec<Character>, StoreError>;
}
