//! Error types for the Inkloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Only the store boundary fails loudly; heuristic analysis degrades
//! silently and never produces one of these.

use std::fmt;
use thiserror::Error;

/// Which kind of narrative record a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Chapter,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Project => "Project",
            EntityKind::Chapter => "Chapter",
        };
        f.write_str(name)
    }
}

/// The top-level error type for all Inkloom operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced project or chapter no longer exists. Not retryable.
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: EntityKind::Project,
            id: id.into(),
        }
    }

    pub fn chapter_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: EntityKind::Chapter,
            id: id.into(),
        }
    }

    /// True for the caller-visible "record no longer exists" failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a `NarrativeStore` implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_entity_and_id() {
        let err = Error::project_not_found("does-not-exist");
        assert_eq!(err.to_string(), "Project not found: does-not-exist");
        assert!(err.is_not_found());

        let err = Error::chapter_not_found("ch-9");
        assert_eq!(err.to_string(), "Chapter not found: ch-9");
    }

    #[test]
    fn store_error_displays_correctly() {
        let err = Error::Store(StoreError::Corrupt {
            id: "char_1".into(),
            reason: "abilities column is not JSON".into(),
        });
        assert!(err.to_string().contains("char_1"));
        assert!(err.to_string().contains("not JSON"));
        assert!(!err.is_not_found());
    }
}
