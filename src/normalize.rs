//! Text surgery applied to a single list entry.
//!
//! The stages run in a fixed order and each one works on the residue left by
//! the previous stage:
//!
//! 0. [`protect_transliterations`] (on the whole expanded page, before parsing)
//! 1. [`split_sense_marker`]
//! 2. [`strip_thesaurus_markers`]
//! 3. [`extract_literal_gloss`]
//! 4. [`extract_trailing_qualifier`]
//! 5. [`is_separator`]
//! 6. [`split_terms`]
//!
//! [`normalize_entry`] chains stages 1 to 6.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

pub const XLIT_START: &str = "XLITS";
pub const XLIT_END: &str = "XLITE";

const THESAURUS_SUFFIX: &str = " [⇒ thesaurus]";

lazy_static! {
    static ref TRANSLIT_SPAN: Regex =
        Regex::new(r#"(?s)<span class="tr Latn"[^>]*>(?:<b>)?(.*?)(?:</b>)?</span>"#).unwrap();
    static ref SENSE_MARKER: Regex = Regex::new(r"(?s)^\(([^)]*)\):\s*(.*)$").unwrap();
    static ref WS_MARKER: Regex = Regex::new(r"\s*\[W[Ss]\]").unwrap();
    static ref LITERAL_GLOSS: Regex =
        Regex::new(r#"(\bliterally\s*)?(, )?[“"]([^"”]*)["”]\s*"#).unwrap();
    static ref TRAILING_QUALIFIER: Regex = Regex::new(r"\(([^)]*)\)$").unwrap();
    static ref XLIT_PAIR: Regex = Regex::new(r"(?s)^(.*?)\s*\(?XLITS(.*?)XLITE\)?").unwrap();
}

/// One candidate term split out of an entry line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub term: String,
    pub transliteration: Option<String>,
}

/// Everything extracted from one list entry. `sense` and `qualifier` are
/// shared by all `terms`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedEntry {
    pub sense: Option<String>,
    pub qualifier: Option<String>,
    pub literal_gloss: Option<String>,
    pub terms: Vec<Term>,
}

/// Stage 0. Replace rendered transliteration spans with `XLITS…XLITE` so later
/// comma splitting and qualifier stripping leave them intact.
pub fn protect_transliterations(expanded: &str) -> Cow<'_, str> {
    TRANSLIT_SPAN.replace_all(expanded, "XLITS${1}XLITE")
}

/// Stage 1. `"(sense): rest"` yields `(Some("sense"), "rest")`.
pub fn split_sense_marker(line: &str) -> (Option<&str>, &str) {
    match SENSE_MARKER.captures(line) {
        Some(cap) => {
            let sense = cap.get(1).map_or("", |m| m.as_str());
            let rest = cap.get(2).map_or("", |m| m.as_str());
            (Some(sense), rest)
        }
        None => (None, line),
    }
}

/// Stage 2. Remove `[WS]` cross-reference markers.
pub fn strip_thesaurus_markers(s: &str) -> Cow<'_, str> {
    WS_MARKER.replace_all(s, "")
}

/// Stage 3. Remove quoted literal glosses; returns the residue and the last
/// gloss found.
pub fn extract_literal_gloss(s: &str) -> (String, Option<String>) {
    let mut gloss = None;
    let residue = LITERAL_GLOSS.replace_all(s, |cap: &regex::Captures| {
        gloss = cap.get(3).map(|m| m.as_str().to_string());
        String::new()
    });
    (residue.into_owned(), gloss)
}

/// Stage 4. Remove a parenthesized qualifier at the end of the string.
///
/// The span is dropped without being returned when it repeats the sense
/// marker, and is kept (minus its parentheses) when it holds a protected
/// transliteration.
pub fn extract_trailing_qualifier(s: &str, sense: Option<&str>) -> (String, Option<String>) {
    let trimmed = s.trim_end();
    let Some(cap) = TRAILING_QUALIFIER.captures(trimmed) else {
        return (trimmed.trim().to_string(), None);
    };
    let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
        return (trimmed.trim().to_string(), None);
    };
    let head = &trimmed[..whole.start()];
    let q = inner.as_str();

    if sense == Some(q) {
        (head.trim().to_string(), None)
    } else if q.contains(XLIT_START) {
        (format!("{}{}", head, q).trim().to_string(), None)
    } else {
        (head.trim().to_string(), Some(q.to_string()))
    }
}

/// Stage 5. Placeholder entries that carry no term.
pub fn is_separator(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.starts_with("---") || s == "\u{2014}"
}

/// Split off a protected transliteration. Running this again on the returned
/// term finds nothing.
pub fn extract_transliteration(s: &str) -> (String, Option<String>) {
    match XLIT_PAIR.captures(s) {
        Some(cap) => {
            let term = cap.get(1).map_or("", |m| m.as_str());
            let xlit = cap.get(2).map_or("", |m| m.as_str()).trim();
            let xlit = (!xlit.is_empty()).then(|| xlit.to_string());
            (term.to_string(), xlit)
        }
        None => (s.to_string(), None),
    }
}

/// Stage 6. Split on commas that are not inside a protected transliteration,
/// then clean each candidate.
pub fn split_terms(s: &str, namespace_prefixes: &[String]) -> Vec<Term> {
    split_outside_sentinels(s)
        .into_iter()
        .filter_map(|candidate| {
            let (term, transliteration) = extract_transliteration(candidate);
            let mut term = term.trim();
            if let Some(prefix) = namespace_prefixes.iter().find(|p| term.starts_with(p.as_str())) {
                term = &term[prefix.len()..];
            }
            let term = term.strip_suffix(THESAURUS_SUFFIX).unwrap_or(term).trim();
            (!term.is_empty()).then(|| Term {
                term: term.to_string(),
                transliteration,
            })
        })
        .collect()
}

fn split_outside_sentinels(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut protected = false;
    let mut i = 0;
    while i < s.len() {
        let rest = &s[i..];
        if rest.starts_with(XLIT_START) {
            protected = true;
            i += XLIT_START.len();
        } else if rest.starts_with(XLIT_END) {
            protected = false;
            i += XLIT_END.len();
        } else {
            let c = rest.chars().next().map_or(1, |c| c.len_utf8());
            if !protected && rest.starts_with(',') {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            i += c;
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Run stages 1 to 6 over one cleaned entry line. `inherited_sense` is used
/// when the line carries no sense marker of its own.
pub fn normalize_entry(
    line: &str,
    inherited_sense: Option<&str>,
    namespace_prefixes: &[String],
) -> NormalizedEntry {
    let (marker, rest) = split_sense_marker(line);
    let sense = marker.or(inherited_sense).map(str::to_string);
    let rest = strip_thesaurus_markers(rest);
    let (rest, literal_gloss) = extract_literal_gloss(&rest);
    let (rest, qualifier) = extract_trailing_qualifier(&rest, sense.as_deref());

    let terms = if is_separator(&rest) {
        Vec::new()
    } else {
        split_terms(&rest, namespace_prefixes)
    };

    NormalizedEntry {
        sense,
        qualifier,
        literal_gloss,
        terms,
    }
}
