//! Bundle file store — projects exported as JSON.
//!
//! The file holds either a single `ProjectBundle` object or an array of
//! them. It is read once on open; the store is read-only afterwards, so a
//! novel exported from the writing application can be assembled against
//! without a database.

use crate::in_memory::InMemoryStore;
use async_trait::async_trait;
use inkloom_core::error::StoreError;
use inkloom_core::narrative::{Chapter, Character, NarrativeProject, ProjectBundle};
use inkloom_core::store::NarrativeStore;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum BundleFile {
    Many(Vec<ProjectBundle>),
    One(Box<ProjectBundle>),
}

/// A read-only store backed by a JSON bundle file.
pub struct BundleFileStore {
    inner: InMemoryStore,
}

impl BundleFileStore {
    /// Open and parse the bundle file at `path`.
    ///
    /// Unlike the config loader, a missing file is an error: there is no
    /// sensible empty default for a novel.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            StoreError::Storage(format!("Failed to read bundle {}: {e}", path.display()))
        })?;

        let bundles = Self::parse_bundles(&content).map_err(|e| StoreError::Corrupt {
            id: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let inner = InMemoryStore::new();
        let count = bundles.len();
        for bundle in bundles {
            inner.import_bundle(bundle).await;
        }

        debug!(path = %path.display(), projects = count, "Bundle file store loaded");
        Ok(Self { inner })
    }

    /// Parse bundle JSON: one bundle object or an array of them.
    pub fn parse_bundles(content: &str) -> Result<Vec<ProjectBundle>, serde_json::Error> {
        Ok(match serde_json::from_str::<BundleFile>(content)? {
            BundleFile::Many(bundles) => bundles,
            BundleFile::One(bundle) => vec![*bundle],
        })
    }
}

#[async_trait]
impl NarrativeStore for BundleFileStore {
    fn name(&self) -> &str {
        "bundle"
    }

    async fn get_project(&self, id: &str) -> Result<Option<NarrativeProject>, StoreError> {
        self.inner.get_project(id).await
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, StoreError> {
        self.inner.get_chapter(id).await
    }

    async fn list_characters(&self, project_id: &str) -> Result<Vec<Character>, StoreError> {
        self.inner.list_characters(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &str = r#"{
        "project": {"id": "p1", "name": "Test", "genre": "isekai"},
        "chapters": [{"id": "c1", "project_id": "p1", "title": "Chapter 1", "content": "Para A."}],
        "characters": [{"id": "h", "project_id": "p1", "name": "Hero"}]
    }"#;

    #[tokio::test]
    async fn opens_single_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novel.json");
        std::fs::write(&path, SINGLE).unwrap();

        let store = BundleFileStore::open(&path).await.unwrap();
        assert_eq!(store.name(), "bundle");
        assert_eq!(store.get_project("p1").await.unwrap().unwrap().genre, "isekai");
        assert_eq!(store.list_characters("p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn opens_array_of_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        let other = SINGLE.replace("\"p1\"", "\"p2\"").replace("\"c1\"", "\"c2\"");
        std::fs::write(&path, format!("[{SINGLE}, {other}]")).unwrap();

        let store = BundleFileStore::open(&path).await.unwrap();
        assert!(store.get_project("p1").await.unwrap().is_some());
        assert!(store.get_project("p2").await.unwrap().is_some());
        assert!(store.get_chapter("c2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_file_is_storage_error() {
        let result = BundleFileStore::open("/nonexistent/novel.json").await;
        assert!(matches!(result, Err(StoreError::Storage(_))));
    }

    #[tokio::test]
    async fn malformed_file_is_corrupt_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"project\": ").unwrap();
        let result = BundleFileStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
