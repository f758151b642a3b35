//! Relation extraction from Wiktionary thesaurus pages.
//!
//! A page body is expanded, parsed into a section/list tree and walked with a
//! context (language, part of speech, sense, relation, inherited tags) that
//! each heading refines. Every term in a list under a known language becomes
//! a [`RelationRecord`].

pub mod dump;
pub mod entries;
pub mod heading;
pub mod model;
pub mod normalize;
pub mod parallel;
pub mod qualifier;
pub mod thesaurus;
pub mod vocab;
pub mod walker;
pub mod wikitext;

pub use entries::{extract_entries, Linkage, Pronunciation, Sense, Translation, WordEntry};
pub use heading::{classify, classify_at, Heading};
pub use model::{RelationRecord, WalkContext};
pub use parallel::{Mode, ParallelConfig, Stats};
pub use qualifier::{resolve_qualifier, QualifierTags};
pub use thesaurus::{extract_thesaurus_page, walk_tree, PageIdentity};
pub use vocab::{ConfigError, Vocabulary};
