//! # Inkloom Core
//!
//! Domain types, traits, and error definitions for the Inkloom context
//! engine. This crate has **no framework dependencies**: it defines the
//! narrative model that the store adapters and the engine build against.
//!
//! ## Design Philosophy
//!
//! The persistence boundary is a trait here (`NarrativeStore`).
//! Implementations live in `inkloom-store`. This enables:
//! - Swapping the backing store via configuration
//! - Easy testing with in-memory or failing stub stores
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod narrative;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{EntityKind, Error, Result, StoreError};
pub use narrative::{Chapter, Character, NarrativeProject, ProjectBundle, Relationship};
pub use store::NarrativeStore;
