//! Senses and linkages from ordinary dictionary pages.
//!
//! Uses the same walker as the thesaurus extractor: a part-of-speech heading
//! opens a section, `#` lists under it are definitions (with `#:` usage
//! examples), `*` lists under a relation heading are linkages and `*` lists
//! under the translations heading are translations. Everything found is
//! grouped into one [`WordEntry`] per (language, part of speech) section; the
//! pronunciations of a language apply to every section that follows them.

use crate::heading::{self, Heading};
use crate::model::WalkContext;
use crate::normalize::{self, normalize_entry, XLIT_END, XLIT_START};
use crate::qualifier::resolve_qualifier;
use crate::vocab::Vocabulary;
use crate::walker::{self, list_item_texts, Descent, SectionRules};
use crate::wikitext::{clean_nodes, Element, NodeKind};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

lazy_static! {
    static ref LEADING_LABELS: Regex = Regex::new(r"(?s)^\(([^)]*)\)\s*(.*)$").unwrap();
    static ref IPA_LINE: Regex = Regex::new(r"^(?:\(([^)]*)\)\s*)?IPA:\s*(.+)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_code: Option<String>,
    pub pos: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pronunciations: Vec<Pronunciation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub senses: Vec<Sense>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linkages: Vec<Linkage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sense {
    pub gloss: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronunciation {
    pub ipa: String,
    /// Accent labels such as `UK`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Language name as written before the colon
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_code: Option<String>,
    pub term: String,
    #[serde(rename = "roman", skip_serializing_if = "Option::is_none")]
    pub transliteration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sense: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linkage {
    pub relation: String,
    pub term: String,
    #[serde(rename = "roman", skip_serializing_if = "Option::is_none")]
    pub transliteration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sense: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Which kind of section the walker is reading lists from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Part {
    #[default]
    Body,
    Pronunciation,
    Translations,
}

/// Context for the entry walk: the shared heading context plus the section
/// the walker is currently inside. Every heading starts a fresh `part`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EntryContext {
    base: WalkContext,
    section: Option<usize>,
    next_section: usize,
    part: Part,
    /// Gloss of the translation table being read
    translation_sense: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Found {
    Sense(Sense),
    Linkage(Linkage),
    Translation(Translation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SectionItem {
    /// Read under a pronunciation heading; not tied to one section
    Pronunciation {
        language: String,
        pronunciation: Pronunciation,
    },
    /// Sense, linkage or translation of one (language, part of speech) section
    Found {
        section: usize,
        language: String,
        pos: String,
        found: Found,
    },
}

/// Extract word entries from a main-namespace page. `None` means the page
/// has no body to walk.
pub fn extract_entries(title: &str, body: &str, vocab: &Vocabulary) -> Option<Vec<WordEntry>> {
    let _span = debug_span!("entries", title).entered();
    if body.trim().is_empty() {
        debug!("empty page body");
        return None;
    }

    let expanded = crate::wikitext::expand(body, vocab);
    let protected = normalize::protect_transliterations(&expanded);
    let tree = crate::wikitext::parse(&protected);

    let rules = EntryRules { vocab };
    let mut items = Vec::new();
    walker::walk(&rules, &tree.children, EntryContext::default(), &mut items);
    Some(group_sections(title, items, vocab))
}

/// Sections are numbered in encounter order, so items of one section are
/// always adjacent. A run of pronunciation items replaces the pronunciations
/// handed to the sections of that language opened after it.
fn group_sections(word: &str, items: Vec<SectionItem>, vocab: &Vocabulary) -> Vec<WordEntry> {
    let mut entries: Vec<(usize, WordEntry)> = Vec::new();
    let mut heard: Option<(String, Vec<Pronunciation>)> = None;
    let mut in_pronunciation_run = false;

    for item in items {
        let (section, language, pos, found) = match item {
            SectionItem::Pronunciation {
                language,
                pronunciation,
            } => {
                let extends = in_pronunciation_run
                    && heard.as_ref().is_some_and(|(lang, _)| *lang == language);
                if !extends {
                    heard = Some((language, Vec::new()));
                }
                if let Some((_, list)) = heard.as_mut() {
                    list.push(pronunciation);
                }
                in_pronunciation_run = true;
                continue;
            }
            SectionItem::Found {
                section,
                language,
                pos,
                found,
            } => (section, language, pos, found),
        };
        in_pronunciation_run = false;

        let open = matches!(entries.last(), Some((last, _)) if *last == section);
        if !open {
            let pronunciations = match &heard {
                Some((lang, list)) if *lang == language => list.clone(),
                _ => Vec::new(),
            };
            entries.push((
                section,
                WordEntry {
                    word: word.to_string(),
                    lang_code: vocab.language_code(&language).map(str::to_string),
                    lang: language,
                    pos,
                    pronunciations,
                    senses: Vec::new(),
                    linkages: Vec::new(),
                    translations: Vec::new(),
                },
            ));
        }
        if let Some((_, entry)) = entries.last_mut() {
            match found {
                Found::Sense(sense) => entry.senses.push(sense),
                Found::Linkage(linkage) => entry.linkages.push(linkage),
                Found::Translation(translation) => entry.translations.push(translation),
            }
        }
    }
    entries.into_iter().map(|(_, entry)| entry).collect()
}

/// Text with transliteration sentinels removed.
fn plain(text: &str) -> String {
    text.replace(XLIT_START, "").replace(XLIT_END, "")
}

struct EntryRules<'a> {
    vocab: &'a Vocabulary,
}

impl EntryRules<'_> {
    fn senses(&self, list: &Element, out: &mut Vec<Sense>) {
        for item in list.child_elements() {
            let NodeKind::ListItem(prefix) = &item.kind else {
                continue;
            };
            let example_marker = format!("{}:", prefix);
            let mut sense = self.sense_from_text(&clean_nodes(&item.children));
            let mut subsenses = Vec::new();
            // ## subsenses and #: examples; #* quotations are skipped
            for nested in item.child_elements() {
                match nested.list_marker() {
                    Some(m) if m.chars().all(|c| c == '#') => self.senses(nested, &mut subsenses),
                    Some(m) if m == example_marker => {
                        if let Some(sense) = sense.as_mut() {
                            sense.examples.extend(
                                list_item_texts(nested)
                                    .map(|text| plain(&text))
                                    .filter(|text| !text.is_empty()),
                            );
                        }
                    }
                    _ => {}
                }
            }
            out.extend(sense);
            out.append(&mut subsenses);
        }
    }

    fn sense_from_text(&self, text: &str) -> Option<Sense> {
        let text = plain(text);
        let (labels, gloss) = match LEADING_LABELS.captures(&text) {
            Some(cap) => (
                cap.get(1).map(|m| m.as_str().to_string()),
                cap.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            ),
            None => (None, text.trim().to_string()),
        };
        if gloss.is_empty() {
            return None;
        }
        let resolved = labels
            .as_deref()
            .map(|l| resolve_qualifier(l, self.vocab))
            .unwrap_or_default();
        Some(Sense {
            gloss,
            tags: resolved.tags,
            topics: resolved.topics,
            examples: Vec::new(),
        })
    }

    /// `(UK) IPA: /haʊs/, /hɑʊs/` lines; audio, rhymes and the like are skipped.
    fn pronunciations(&self, list: &Element) -> Vec<Pronunciation> {
        let mut found = Vec::new();
        for line in list_item_texts(list) {
            let Some(cap) = IPA_LINE.captures(&line) else {
                continue;
            };
            let tags = cap
                .get(1)
                .map(|m| resolve_qualifier(m.as_str(), self.vocab).tags)
                .unwrap_or_default();
            let transcriptions = cap.get(2).map_or("", |m| m.as_str());
            for ipa in transcriptions.split(", ").map(str::trim).filter(|s| !s.is_empty()) {
                found.push(Pronunciation {
                    ipa: ipa.to_string(),
                    tags: tags.clone(),
                });
            }
        }
        found
    }

    /// `Language: term, term` lines of a translation table.
    fn translations(&self, list: &Element, ctx: &EntryContext) -> Vec<Translation> {
        let prefixes = self.vocab.thesaurus_prefixes();
        let mut translations = Vec::new();
        for line in list_item_texts(list) {
            let Some((language, rest)) = line.split_once(':') else {
                debug!(line = %plain(&line), "translation line without language");
                continue;
            };
            let language = language.trim();
            let lang_code = self.vocab.language_code(language).map(str::to_string);
            if lang_code.is_none() {
                debug!(lang = language, "translation language not recognized");
            }
            let entry = normalize_entry(rest.trim(), ctx.translation_sense.as_deref(), &prefixes);
            let tags = entry
                .qualifier
                .as_deref()
                .map(|q| resolve_qualifier(q, self.vocab).tags)
                .unwrap_or_default();
            for term in entry.terms {
                translations.push(Translation {
                    lang: language.to_string(),
                    lang_code: lang_code.clone(),
                    term: term.term,
                    transliteration: term.transliteration,
                    sense: entry.sense.clone(),
                    tags: tags.clone(),
                });
            }
        }
        translations
    }

    fn linkages(&self, list: &Element, ctx: &WalkContext, relation: &str) -> Vec<Linkage> {
        let prefixes = self.vocab.thesaurus_prefixes();
        let mut linkages = Vec::new();
        for line in list_item_texts(list) {
            let entry = normalize_entry(&line, ctx.sense.as_deref(), &prefixes);
            let resolved = entry
                .qualifier
                .as_deref()
                .map(|q| resolve_qualifier(q, self.vocab))
                .unwrap_or_default();
            let mut tags = ctx.inherited_tags.clone();
            for tag in resolved.tags {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            for term in entry.terms {
                linkages.push(Linkage {
                    relation: relation.to_string(),
                    term: term.term,
                    transliteration: term.transliteration,
                    sense: entry.sense.clone(),
                    tags: tags.clone(),
                });
            }
        }
        linkages
    }
}

impl SectionRules for EntryRules<'_> {
    type Context = EntryContext;
    type Output = SectionItem;

    fn enter_heading(&self, level: u8, label: &str, ctx: &EntryContext) -> Descent<EntryContext> {
        let mut next = EntryContext {
            section: ctx.section,
            next_section: ctx.next_section,
            ..Default::default()
        };
        if self.vocab.is_pronunciation_heading(label) {
            next.part = Part::Pronunciation;
        } else if self.vocab.is_translations_heading(label) {
            next.part = Part::Translations;
        }
        if next.part != Part::Body {
            next.base = ctx.base.clone();
            next.base.relation_type = None;
            return Descent::Into(next);
        }

        let heading = heading::classify_at(level, label, self.vocab);
        let Some(mut base) = heading.apply(&ctx.base) else {
            return Descent::Skip;
        };
        match heading {
            Heading::Language(_) => next.section = None,
            Heading::PartOfSpeech(_) => {
                next.section = Some(next.next_section);
                next.next_section += 1;
            }
            // Etymology, Usage notes and the like end any linkage section
            Heading::Unknown => base.relation_type = None,
            _ => {}
        }
        next.base = base;
        Descent::Into(next)
    }

    fn is_leaf(&self, list: &Element) -> bool {
        list.list_marker().is_some_and(|m| m.starts_with('#')) || list.is_terminal_list()
    }

    fn emit_list(&self, list: &Element, ctx: &EntryContext, out: &mut Vec<SectionItem>) {
        let Some(language) = ctx.base.language.as_deref() else {
            return;
        };
        if ctx.part == Part::Pronunciation {
            out.extend(self.pronunciations(list).into_iter().map(|pronunciation| {
                SectionItem::Pronunciation {
                    language: language.to_string(),
                    pronunciation,
                }
            }));
            return;
        }

        let (Some(section), Some(pos)) = (ctx.section, ctx.base.part_of_speech.as_deref()) else {
            return;
        };
        let wrap = |found| SectionItem::Found {
            section,
            language: language.to_string(),
            pos: pos.to_string(),
            found,
        };

        let is_definitions = list.list_marker().is_some_and(|m| m.starts_with('#'));
        if ctx.part == Part::Translations {
            let translations = self.translations(list, ctx);
            out.extend(translations.into_iter().map(Found::Translation).map(wrap));
        } else if is_definitions {
            let mut senses = Vec::new();
            self.senses(list, &mut senses);
            out.extend(senses.into_iter().map(Found::Sense).map(wrap));
        } else if let Some(relation) = ctx.base.relation_type.as_deref() {
            let linkages = self.linkages(list, &ctx.base, relation);
            out.extend(linkages.into_iter().map(Found::Linkage).map(wrap));
        }
    }

    /// `{{trans-top|gloss}}` lines set the sense of the translations below them.
    fn read_text(&self, text: &str, mut ctx: EntryContext) -> EntryContext {
        if ctx.part == Part::Translations {
            let prefix = self.vocab.sense_prefix();
            let text = text.trim();
            if let Some(gloss) = text
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .and_then(|_| text.get(prefix.len()..))
            {
                let gloss = gloss.trim();
                ctx.translation_sense = (!gloss.is_empty()).then(|| gloss.to_string());
            }
        }
        ctx
    }
}
