//! Narrative store implementations for Inkloom.
//!
//! Every adapter implements the read-only `NarrativeStore` trait the
//! engine consumes. Write paths (`insert_*`, `import_bundle`) are inherent
//! methods used by importers and tests only.

pub mod bundle_file;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use bundle_file::BundleFileStore;
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
