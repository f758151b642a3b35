//! Built-in template expansion.
//!
//! Only the templates that thesaurus and definition lists are written with are
//! rendered; every other template expands to nothing. Links are copied through
//! untouched so the tree parser can pick them up.

use super::{clean_nodes, parse::parse_inline};
use crate::vocab::Vocabulary;
use std::collections::HashSet;
use tracing::trace;

/// Templates nested deeper than this are copied as plain text.
pub const MAX_TEMPLATE_DEPTH: usize = 64;

/// Parsed template: {{name|param1|key=value|...}}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub positional: Vec<String>,
    pub named: Vec<(String, String)>,
}

impl Template {
    /// Positional argument `index` (0-based, after the name), if non-empty.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.positional
            .get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn named(&self, key: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Expand every template in `text`, drop HTML comments and unwrap `<nowiki>`.
pub fn expand(text: &str, vocab: &Vocabulary) -> String {
    let mut expander = Expander::new(text, vocab);
    expander.expand_all()
}

/// Recursive descent over template syntax. Nesting is handled by the call
/// stack: a `{{` inside a parameter recurses into `parse_template`, at most
/// `MAX_TEMPLATE_DEPTH` levels deep.
struct Expander<'a> {
    text: &'a str,
    pos: usize,
    vocab: &'a Vocabulary,
    depth: usize,
    /// Set when a template ran off the end of the text; every enclosing
    /// template is then unterminated as well.
    ran_off_end: bool,
    /// Start offsets of `{{` already known to run off the end of the text.
    unterminated: HashSet<usize>,
}

impl<'a> Expander<'a> {
    fn new(text: &'a str, vocab: &'a Vocabulary) -> Self {
        Expander {
            text,
            pos: 0,
            vocab,
            depth: 0,
            ran_off_end: false,
            unterminated: HashSet::new(),
        }
    }

    fn looking_at(&self, s: &str) -> bool {
        self.text[self.pos..].starts_with(s)
    }

    fn consume(&mut self, s: &str) {
        debug_assert!(self.looking_at(s));
        self.pos += s.len();
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.text[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    // ─────────────────────────────────────────────────────────────
    // text ::= (template | comment | nowiki | char)*
    // ─────────────────────────────────────────────────────────────
    fn expand_all(&mut self) -> String {
        let mut out = String::with_capacity(self.text.len());
        while !self.at_end() {
            if !self.expand_special(&mut out) {
                if let Some(c) = self.consume_char() {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Handle constructs shared by top-level text and template parameters.
    /// Returns false if nothing special starts at the cursor.
    fn expand_special(&mut self, out: &mut String) -> bool {
        if self.looking_at("{{") {
            let start = self.pos;
            if self.depth >= MAX_TEMPLATE_DEPTH || self.unterminated.contains(&start) {
                if self.depth >= MAX_TEMPLATE_DEPTH {
                    trace!(offset = start, "template nesting too deep, copied as text");
                }
                self.consume("{{");
                out.push_str("{{");
                return true;
            }
            self.depth += 1;
            let parsed = self.parse_template();
            self.depth -= 1;
            match parsed {
                Some(template) => out.push_str(&render(&template, self.vocab)),
                // Unterminated: the braces are plain text and scanning resumes
                // right after them
                None => {
                    self.unterminated.insert(start);
                    if self.depth == 0 {
                        self.ran_off_end = false;
                    }
                    self.pos = start;
                    self.consume("{{");
                    out.push_str("{{");
                }
            }
            true
        } else if self.looking_at("<!--") {
            self.skip_comment();
            true
        } else if self.looking_at("<nowiki>") {
            self.consume("<nowiki>");
            let rest = &self.text[self.pos..];
            let end = rest.find("</nowiki>").unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            self.pos += end;
            if self.looking_at("</nowiki>") {
                self.consume("</nowiki>");
            }
            true
        } else if self.looking_at("[[") {
            match self.copy_wikilink() {
                Some(link) => out.push_str(link),
                None => {
                    self.consume("[[");
                    out.push_str("[[");
                }
            }
            true
        } else {
            false
        }
    }

    fn skip_comment(&mut self) {
        let rest = &self.text[self.pos..];
        match rest.find("-->") {
            Some(end) => self.pos += end + "-->".len(),
            None => self.pos = self.text.len(),
        }
    }

    /// Copy `[[...]]` verbatim, including nested links (file captions). A link
    /// never spans lines: with no closing `]]` before the end of the line the
    /// cursor is left where it was and `None` is returned.
    fn copy_wikilink(&mut self) -> Option<&'a str> {
        let text = self.text;
        let start = self.pos;
        let mut pos = start + 2;
        let mut depth = 1;
        while depth > 0 {
            let rest = &text[pos..];
            if rest.starts_with("[[") {
                pos += 2;
                depth += 1;
            } else if rest.starts_with("]]") {
                pos += 2;
                depth -= 1;
            } else {
                let c = rest.chars().next()?;
                if c == '\n' {
                    return None;
                }
                pos += c.len_utf8();
            }
        }
        self.pos = pos;
        Some(&text[start..pos])
    }

    // ─────────────────────────────────────────────────────────────
    // template ::= "{{" param ("|" param)* "}}"
    // ─────────────────────────────────────────────────────────────
    fn parse_template(&mut self) -> Option<Template> {
        self.consume("{{");
        let mut params = Vec::new();
        loop {
            params.push(self.parse_param());
            if self.ran_off_end {
                return None;
            }
            if self.looking_at("|") {
                self.consume("|");
            } else if self.looking_at("}}") {
                self.consume("}}");
                break;
            } else {
                self.ran_off_end = true;
                return None;
            }
        }

        let mut params = params.into_iter();
        let name = params
            .next()
            .map(|n| n.trim().to_lowercase())
            .unwrap_or_default();
        let mut positional = Vec::new();
        let mut named = Vec::new();
        for param in params {
            match split_named(&param) {
                Some((key, value)) => named.push((key, value)),
                None => positional.push(param),
            }
        }
        Some(Template {
            name,
            positional,
            named,
        })
    }

    // ─────────────────────────────────────────────────────────────
    // param ::= (template | link | char)*  (terminated by | or }})
    // ─────────────────────────────────────────────────────────────
    fn parse_param(&mut self) -> String {
        let mut result = String::new();
        while !self.at_end()
            && !self.ran_off_end
            && !self.looking_at("|")
            && !self.looking_at("}}")
        {
            if !self.expand_special(&mut result) {
                if let Some(c) = self.consume_char() {
                    result.push(c);
                }
            }
        }
        result
    }
}

fn split_named(param: &str) -> Option<(String, String)> {
    let (key, value) = param.split_once('=')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ');
    valid.then(|| (key.to_string(), value.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn render(template: &Template, vocab: &Vocabulary) -> String {
    match template.name.as_str() {
        "ws" => {
            // {{ws|en|term}} or the older {{ws|term}}
            let has_lang = template.positional.len() >= 2
                && template
                    .arg(0)
                    .is_some_and(|code| vocab.language_name(code).is_some());
            render_link(template, if has_lang { 1 } else { 0 })
        }
        "l" | "l-self" | "ll" | "m" | "mention" | "m-self" => render_link(template, 1),
        "q" | "qual" | "qualifier" | "i" | "qf" | "qq" | "gloss" | "gl" => {
            let parts: Vec<&str> = (0..template.positional.len())
                .filter_map(|i| template.arg(i))
                .collect();
            parenthesize(&parts)
        }
        "lb" | "lbl" | "label" | "tlb" => {
            let labels: Vec<&str> = (1..template.positional.len())
                .filter_map(|i| template.arg(i))
                .filter(|l| !matches!(*l, "_" | "and" | "or"))
                .collect();
            parenthesize(&labels)
        }
        "s" | "sense" => template
            .arg(0)
            .map(|sense| format!("({}):", sense))
            .unwrap_or_default(),
        "ws sense" => {
            let gloss = if template.positional.len() >= 2 {
                template.arg(1)
            } else {
                template.arg(0)
            };
            gloss
                .map(|g| format!("{} {}", vocab.sense_prefix(), g))
                .unwrap_or_default()
        }
        // Translation table gloss; read as a sense line by the entries walker
        "trans-top" => template
            .arg(0)
            .map(|g| format!("{} {}", vocab.sense_prefix(), clean_nodes(&parse_inline(g))))
            .unwrap_or_default(),
        "t" | "t+" | "tt" | "tt+" | "t-check" | "t+check" => render_translation(template),
        "ux" | "uxi" | "usex" | "eg" => {
            let Some(example) = template.arg(1) else {
                return String::new();
            };
            let translation = template
                .named("t")
                .or_else(|| template.named("translation"))
                .or_else(|| template.arg(2));
            match translation {
                Some(t) => format!("{} ― {}", example, t),
                None => example.to_string(),
            }
        }
        "ipa" => {
            let ipa: Vec<&str> = (1..template.positional.len())
                .filter_map(|i| template.arg(i))
                .collect();
            if ipa.is_empty() {
                String::new()
            } else {
                format!("IPA: {}", ipa.join(", "))
            }
        }
        "a" | "accent" => {
            let accents: Vec<&str> = (0..template.positional.len())
                .filter_map(|i| template.arg(i))
                .collect();
            parenthesize(&accents)
        }
        "w" => template
            .arg(1)
            .or_else(|| template.arg(0))
            .unwrap_or_default()
            .to_string(),
        other => {
            trace!(template = other, "template expands to nothing");
            String::new()
        }
    }
}

fn parenthesize(parts: &[&str]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!("({})", parts.join(", "))
    }
}

/// `{{t|de|Haus|n|tr=...}}`: the positionals after the term are genders, not
/// display text.
fn render_translation(template: &Template) -> String {
    let Some(term) = template.arg(1) else {
        return String::new();
    };
    let mut out = match template.named("alt") {
        Some(alt) => format!("[[{}|{}]]", term, alt),
        None => format!("[[{}]]", term),
    };
    if let Some(tr) = template.named("tr") {
        out.push_str(&format!(" (<span class=\"tr Latn\">{}</span>)", tr));
    }
    out
}

/// Render a link template as `[[term|alt]] (translit) “gloss” (qualifier)`.
fn render_link(template: &Template, term_index: usize) -> String {
    let Some(term) = template.arg(term_index) else {
        return String::new();
    };
    let mut out = match template.arg(term_index + 1) {
        Some(alt) => format!("[[{}|{}]]", term, alt),
        None if term.contains("[[") => term.to_string(),
        None => format!("[[{}]]", term),
    };
    if let Some(tr) = template.named("tr") {
        out.push_str(&format!(" (<span class=\"tr Latn\">{}</span>)", tr));
    }
    let gloss = template
        .named("t")
        .or_else(|| template.named("gloss"))
        .or_else(|| template.arg(term_index + 2));
    if let Some(gloss) = gloss {
        out.push_str(&format!(" “{}”", gloss));
    }
    if let Some(q) = template.named("q").or_else(|| template.named("qq")) {
        out.push_str(&format!(" ({})", q));
    }
    out
}
