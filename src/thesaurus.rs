//! Relation extraction from thesaurus pages.

use crate::heading::{self, Heading};
use crate::model::{RelationRecord, WalkContext};
use crate::normalize::{self, normalize_entry};
use crate::qualifier::resolve_qualifier;
use crate::vocab::Vocabulary;
use crate::walker::{self, list_item_texts, Descent, SectionRules};
use crate::wikitext::{self, Element};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, debug_span};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WS_HEADER_LANG: Regex = Regex::new(r"(?s)\{\{ws header\|[^}]*lang=([^}|]*)").unwrap();
}

/// Title of a thesaurus page and the word its relations belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIdentity {
    pub title: String,
    pub entry_word: String,
}

impl PageIdentity {
    /// `Thesaurus:house` -> `house`, `Thesaurus:de:Haus` -> `Haus`. Returns
    /// `None` for subpages and the requested-entries placeholder pages.
    pub fn from_title(title: &str, vocab: &Vocabulary) -> Option<Self> {
        let title: String = title.trim().nfc().collect();
        let namespace = vocab.thesaurus_namespace();
        let requested = format!("{}:{}", namespace, vocab.requested_entries_prefix());
        if title.starts_with(&requested) || title.contains('/') {
            return None;
        }

        let mut word = vocab
            .thesaurus_prefixes()
            .iter()
            .find_map(|prefix| title.strip_prefix(prefix.as_str()))
            .unwrap_or(&title);
        if let Some(idx) = word.find(':') {
            if (1..5).contains(&idx) {
                word = &word[idx + 1..];
            }
        }

        Some(PageIdentity {
            entry_word: word.to_string(),
            title,
        })
    }
}

/// Language named by a page-level `{{ws header|lang=xx}}`, if any.
pub fn seed_language(body: &str, vocab: &Vocabulary) -> Option<String> {
    let cap = WS_HEADER_LANG.captures(body)?;
    let code = cap[1].trim();
    match vocab.language_name(code) {
        Some(name) => Some(name.to_string()),
        None => {
            debug!(code, "ws header names an unknown language code");
            None
        }
    }
}

/// Expand templates, protect transliterations and parse into a tree.
pub fn prepare_tree(body: &str, vocab: &Vocabulary) -> Element {
    let expanded = wikitext::expand(body, vocab);
    let protected = normalize::protect_transliterations(&expanded);
    wikitext::parse(&protected)
}

/// Extract every relation on a thesaurus page. `None` means the page was
/// rejected before walking.
pub fn extract_thesaurus_page(
    title: &str,
    body: &str,
    vocab: &Vocabulary,
) -> Option<Vec<RelationRecord>> {
    let page = PageIdentity::from_title(title, vocab)?;
    let _span = debug_span!("thesaurus", title = %page.title).entered();
    if body.trim().is_empty() {
        debug!("empty page body");
        return None;
    }

    let tree = prepare_tree(body, vocab);
    let ctx = WalkContext::with_language(seed_language(body, vocab));
    Some(walk_tree(&page, &tree, ctx, vocab))
}

/// Walk an already parsed tree from `ctx`.
pub fn walk_tree(
    page: &PageIdentity,
    tree: &Element,
    ctx: WalkContext,
    vocab: &Vocabulary,
) -> Vec<RelationRecord> {
    let rules = ThesaurusRules { page, vocab };
    let mut records = Vec::new();
    walker::walk(&rules, &tree.children, ctx, &mut records);
    records
}

struct ThesaurusRules<'a> {
    page: &'a PageIdentity,
    vocab: &'a Vocabulary,
}

impl SectionRules for ThesaurusRules<'_> {
    type Context = WalkContext;
    type Output = RelationRecord;

    fn enter_heading(&self, level: u8, label: &str, ctx: &WalkContext) -> Descent<WalkContext> {
        let heading = heading::classify_at(level, label, self.vocab);
        if heading == Heading::Unknown {
            debug!(
                heading = label,
                lang = ?ctx.language,
                pos = ?ctx.part_of_speech,
                sense = ?ctx.sense,
                "unhandled heading"
            );
        }
        match heading.apply(ctx) {
            Some(next) => Descent::Into(next),
            None => Descent::Skip,
        }
    }

    fn emit_list(&self, list: &Element, ctx: &WalkContext, out: &mut Vec<RelationRecord>) {
        let Some(language) = ctx.language.as_deref() else {
            debug!(pos = ?ctx.part_of_speech, "list without language");
            return;
        };
        let language_code = self.vocab.language_code(language).map(str::to_string);
        if language_code.is_none() {
            debug!(lang = language, "language not recognized");
        }
        let prefixes = self.vocab.thesaurus_prefixes();

        for line in list_item_texts(list) {
            if line.contains('*') {
                debug!(lang = language, pos = ?ctx.part_of_speech, line = %line, "star in entry");
            }
            let entry = normalize_entry(&line, ctx.sense.as_deref(), &prefixes);
            if let Some(gloss) = &entry.literal_gloss {
                debug!(lang = language, line = %line, gloss = %gloss, "literal gloss discarded");
            }

            let qualifiers = entry
                .qualifier
                .as_deref()
                .map(|q| resolve_qualifier(q, self.vocab))
                .unwrap_or_default();
            let tags: BTreeSet<String> = ctx
                .inherited_tags
                .iter()
                .chain(qualifiers.tags.iter())
                .cloned()
                .collect();
            let topics: BTreeSet<String> = qualifiers.topics.iter().cloned().collect();

            for term in entry.terms {
                out.push(RelationRecord {
                    entry_word: self.page.entry_word.clone(),
                    language_code: language_code.clone(),
                    part_of_speech: ctx.part_of_speech.clone(),
                    relation_type: ctx.relation_or_default().to_string(),
                    term: term.term,
                    tags: tags.clone(),
                    topics: topics.clone(),
                    transliteration: term.transliteration,
                    sense: entry.sense.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vocab() -> &'static Vocabulary {
        Vocabulary::builtin()
    }

    fn extract(title: &str, body: &str) -> Option<Vec<RelationRecord>> {
        extract_thesaurus_page(title, body, vocab())
    }

    fn terms(records: &[RelationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.term.as_str()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn page_identity_strips_namespace_and_language_infix() {
        let page = PageIdentity::from_title("Thesaurus:house", vocab()).unwrap();
        assert_eq!(page.entry_word, "house");
        let page = PageIdentity::from_title("Thesaurus:de:Haus", vocab()).unwrap();
        assert_eq!(page.entry_word, "Haus");
        let page = PageIdentity::from_title("Thesaurus:word:with colon", vocab()).unwrap();
        assert_eq!(page.entry_word, "word:with colon");
    }

    #[test]
    fn page_identity_rejects_subpages_and_placeholders() {
        assert_eq!(PageIdentity::from_title("Thesaurus:house/more", vocab()), None);
        assert_eq!(
            PageIdentity::from_title("Thesaurus:Requested entries (English)", vocab()),
            None
        );
    }

    #[test]
    fn title_with_slash_yields_nothing() {
        assert_eq!(extract("Thesaurus:and/or", "==English==\n* foo\n"), None);
    }

    #[test]
    fn empty_body_is_rejected() {
        assert_eq!(extract("Thesaurus:house", "  \n"), None);
    }

    #[test]
    fn sense_marker_applies_to_every_term() {
        let records = extract("Thesaurus:thing", "==English==\n* (formal): foo, bar\n").unwrap();
        assert_eq!(terms(&records), vec!["foo", "bar"]);
        for record in &records {
            assert_eq!(record.sense.as_deref(), Some("formal"));
            assert_eq!(record.relation_type, "synonyms");
            assert_eq!(record.language_code.as_deref(), Some("en"));
            assert_eq!(record.entry_word, "thing");
        }
    }

    #[test]
    fn trailing_qualifier_becomes_tags() {
        let records = extract("Thesaurus:thing", "==English==\n* baz (slang)\n").unwrap();
        assert_eq!(terms(&records), vec!["baz"]);
        assert!(records[0].tags.contains("slang"));
    }

    #[test]
    fn tag_heading_then_relation_heading() {
        let body = "==English==\n===Slang===\n====Synonyms====\n* qux\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].term, "qux");
        assert_eq!(records[0].tags, set(&["slang"]));
        assert_eq!(records[0].relation_type, "synonyms");
    }

    #[test]
    fn list_without_language_emits_nothing() {
        let records = extract("Thesaurus:thing", "* orphan\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn ws_header_seeds_language() {
        let body = "{{ws header|lang=de}}\n===Synonyms===\n* Heim\n";
        let records = extract("Thesaurus:de:Haus", body).unwrap();
        assert_eq!(terms(&records), vec!["Heim"]);
        assert_eq!(records[0].language_code.as_deref(), Some("de"));
        assert_eq!(records[0].entry_word, "Haus");
    }

    #[test]
    fn ignored_sections_are_not_read() {
        let body = "==English==\n===Synonyms===\n* a\n===Further reading===\n* b\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(terms(&records), vec!["a"]);
    }

    #[test]
    fn unknown_headings_are_descended() {
        let body = "==English==\n===Odd heading===\n* a\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(terms(&records), vec!["a"]);
    }

    #[test]
    fn full_page_with_templates() {
        let body = "\
{{ws header|lang=en}}
==English==
===Noun===
===={{ws sense|en|a place to live}}====
=====Synonyms=====
{{ws beginlist}}
* {{ws|en|abode}} {{q|formal}}
* {{ws|en|home}}, {{ws|en|pad}}
* {{ws|en|crib}} “literal gloss”
{{ws endlist}}
=====Antonyms=====
* {{ws|en|homelessness}}
====Sense: a building====
* {{ws|en|edifice}}
";
        let records = extract("Thesaurus:house", body).unwrap();
        assert_eq!(
            terms(&records),
            vec!["abode", "home", "pad", "crib", "homelessness", "edifice"]
        );
        assert_eq!(records[0].tags, set(&["formal"]));
        assert_eq!(records[0].part_of_speech.as_deref(), Some("noun"));
        assert_eq!(records[0].sense.as_deref(), Some("a place to live"));
        assert_eq!(records[4].relation_type, "antonyms");
        assert_eq!(records[5].sense.as_deref(), Some("a building"));
        assert_eq!(records[5].relation_type, "synonyms");
        assert_eq!(records[5].part_of_speech.as_deref(), Some("noun"));
    }

    #[test]
    fn transliterations_survive_the_pipeline() {
        let body = "==Russian==\n===Synonyms===\n* {{l|ru|жилище|tr=žilišče}}, {{l|ru|дом|tr=dom}}\n";
        let records = extract("Thesaurus:ru:дом", body).unwrap();
        assert_eq!(terms(&records), vec!["жилище", "дом"]);
        assert_eq!(records[0].transliteration.as_deref(), Some("žilišče"));
        assert_eq!(records[1].transliteration.as_deref(), Some("dom"));
        assert_eq!(records[1].language_code.as_deref(), Some("ru"));
    }

    #[test]
    fn record_count_matches_split_terms() {
        let body = "==English==\n* a, b, , c\n* —\n* ----\n* d (rare)\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(terms(&records), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn new_language_heading_resets_context() {
        let body = "==English==\n===Noun===\n====Antonyms====\n* a\n==French==\n* b\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(records[1].language_code.as_deref(), Some("fr"));
        assert_eq!(records[1].part_of_speech, None);
        assert_eq!(records[1].relation_type, "synonyms");
    }

    #[test]
    fn language_heading_drops_tags_of_the_previous_language() {
        let body = "==English==\n===Slang===\n====Synonyms====\n* a\n==French==\n===Synonyms===\n* b\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(terms(&records), vec!["a", "b"]);
        assert_eq!(records[0].tags, set(&["slang"]));
        assert_eq!(records[1].language_code.as_deref(), Some("fr"));
        assert!(records[1].tags.is_empty());
    }

    #[test]
    fn less_common_language_heading_resets_context() {
        let body = "==English==\n===Antonyms===\n* a\n==Yoruba==\n* b\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(terms(&records), vec!["a", "b"]);
        assert_eq!(records[1].language_code.as_deref(), Some("yo"));
        assert_eq!(records[1].relation_type, "synonyms");
    }

    #[test]
    fn unlisted_language_heading_still_starts_a_new_section() {
        let body = "==English==\n===Antonyms===\n* a\n==Lingua Ignota==\n* b\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(terms(&records), vec!["a", "b"]);
        assert_eq!(records[1].language_code, None);
        assert_eq!(records[1].relation_type, "synonyms");
    }

    #[test]
    fn unclosed_link_does_not_hide_later_sections() {
        let body = "==English==\n* [[foo\n===Antonyms===\n* {{ws|en|bar}}\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        let bar = records.iter().find(|r| r.term == "bar").unwrap();
        assert_eq!(bar.relation_type, "antonyms");
        assert!(records.iter().all(|r| !r.term.contains("{{")));
    }

    #[test]
    fn pathological_nesting_is_walked_without_overflow() {
        let body = format!(
            "==English==\n{} x\n{}\n===Antonyms===\n* y\n",
            "*".repeat(20_000),
            "{{q|".repeat(3_000)
        );
        let records = extract("Thesaurus:thing", &body).unwrap();
        assert!(records.iter().any(|r| r.term == "y" && r.relation_type == "antonyms"));
    }

    #[test]
    fn inherited_tags_merge_with_item_tags() {
        let body = "==English==\n===Euphemisms===\n* a (dated)\n";
        let records = extract("Thesaurus:thing", body).unwrap();
        assert_eq!(records[0].tags, set(&["dated", "euphemism"]));
    }

    #[test]
    fn thesaurus_links_are_unwrapped() {
        let body = "==English==\n* [[Thesaurus:abode]], home [⇒ thesaurus] [WS]\n";
        let records = extract("Thesaurus:house", body).unwrap();
        assert_eq!(terms(&records), vec!["abode", "home"]);
    }
}
