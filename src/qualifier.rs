use crate::vocab::Vocabulary;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref QUALIFIER_SEPARATOR: Regex = Regex::new(r"\s*(?:[,;]|\bor\b|\band\b)\s*").unwrap();
}

/// Tags and topics resolved from a qualifier span, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualifierTags {
    pub tags: Vec<String>,
    pub topics: Vec<String>,
}

impl QualifierTags {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.topics.is_empty()
    }

    fn push_tags(&mut self, tags: &[String]) {
        push_unique(&mut self.tags, tags);
    }

    fn push_topics(&mut self, topics: &[String]) {
        push_unique(&mut self.topics, topics);
    }
}

fn push_unique(target: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

/// Resolve a free-text qualifier such as `"slang, chiefly British"`.
///
/// The whole span is looked up first; otherwise it is split on commas,
/// semicolons, "and" and "or" and each part is looked up on its own. Parts
/// that match neither table are logged and dropped.
pub fn resolve_qualifier(text: &str, vocab: &Vocabulary) -> QualifierTags {
    let mut resolved = QualifierTags::default();
    if lookup(text, vocab, &mut resolved) {
        return resolved;
    }

    for part in QUALIFIER_SEPARATOR.split(text) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if !lookup(part, vocab, &mut resolved) {
            let unqualified = strip_modifier(part);
            if unqualified == part || !lookup(unqualified, vocab, &mut resolved) {
                debug!(qualifier = text, part, "unrecognized qualifier");
            }
        }
    }
    resolved
}

fn lookup(label: &str, vocab: &Vocabulary, resolved: &mut QualifierTags) -> bool {
    let mut found = false;
    if let Some(tags) = vocab.qualifier_tags(label) {
        resolved.push_tags(tags);
        found = true;
    }
    if let Some(topics) = vocab.qualifier_topics(label) {
        resolved.push_topics(topics);
        found = true;
    }
    found
}

/// "chiefly British" -> "British"
fn strip_modifier(part: &str) -> &str {
    const MODIFIERS: &[&str] = &[
        "chiefly ",
        "mainly ",
        "mostly ",
        "especially ",
        "often ",
        "sometimes ",
        "usually ",
        "now ",
    ];
    let lowered = part.to_lowercase();
    MODIFIERS
        .iter()
        .find(|m| lowered.starts_with(*m))
        .and_then(|m| part.get(m.len()..))
        .map_or(part, str::trim_start)
}
