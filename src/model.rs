use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_RELATION: &str = "synonyms";

/// One extracted thesaurus term together with the section context it was found in.
/// Field order is fixed so JSONL output diffs cleanly between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    #[serde(rename = "entry")]
    pub entry_word: String,
    #[serde(rename = "lang_code", skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(rename = "pos", skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(rename = "linkage")]
    pub relation_type: String,
    pub term: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub topics: BTreeSet<String>,
    #[serde(rename = "roman", skip_serializing_if = "Option::is_none")]
    pub transliteration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sense: Option<String>,
}

/// Section context inherited by everything below a heading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkContext {
    pub language: Option<String>,
    pub part_of_speech: Option<String>,
    pub sense: Option<String>,
    pub relation_type: Option<String>,
    pub inherited_tags: Vec<String>,
}

impl WalkContext {
    pub fn with_language(language: Option<String>) -> Self {
        WalkContext {
            language,
            ..Default::default()
        }
    }

    pub fn relation_or_default(&self) -> &str {
        self.relation_type.as_deref().unwrap_or(DEFAULT_RELATION)
    }

    /// Add tags that are not already inherited, keeping first-seen order.
    pub fn merge_tags<'a>(&mut self, tags: impl IntoIterator<Item = &'a String>) {
        for tag in tags {
            if !self.inherited_tags.contains(tag) {
                self.inherited_tags.push(tag.clone());
            }
        }
    }
}
