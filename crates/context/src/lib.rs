//! The context assembly and compression engine.
//!
//! Turns narrative records into one bounded prompt for a model that
//! continues a chapter at a cursor:
//!
//! 1. **Build** labeled sections from the project, the chapter text before
//!    the cursor, and the characters it mentions (`ContextBuilder`,
//!    `CharacterRelevanceAnalyzer`)
//! 2. **Compress** the sections toward a token budget by importance
//!    (`ContextCompressor`)
//! 3. **Score** the result for diagnostics (`QualityAnalyzer`)
//!
//! `ContextEngine` wires the four together over one `NarrativeStore`.
//!
//! Assembly is deterministic: identical records and requests always
//! produce identical contexts.

pub mod builder;
pub mod compressor;
pub mod engine;
pub mod mention;
pub mod quality;
pub mod relevance;
pub mod section;
pub mod token;

pub use builder::ContextBuilder;
pub use compressor::{ContextCompressor, ELLIPSIS};
pub use engine::{
    AssembledPrompt, AssemblyMetadata, AssemblyRequest, ContextEngine, PromptPair,
    CONTINUATION_SYSTEM_PROMPT,
};
pub use mention::{LiteralMentionMatcher, MentionMatcher};
pub use quality::{ConsistencyIssue, IssueKind, IssueSeverity, QualityAnalyzer, QualityReport};
pub use relevance::CharacterRelevanceAnalyzer;
pub use section::{AssembledContext, ContextSection, SectionKind};
