use super::node::{Node, NodeKind};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"</?[A-Za-z][^>]*>").unwrap();
    static ref BOLD_ITALIC: Regex = Regex::new(r"'{2,}").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

const DROPPED_LINK_NAMESPACES: &[&str] = &["category:", "file:", "image:"];

/// Render inline nodes to plain text. Nested lists are skipped, so cleaning a
/// list item yields only that item's own line.
pub fn clean_nodes(nodes: &[Node]) -> String {
    let mut raw = String::new();
    render_into(nodes, &mut raw);
    clean_text(&raw)
}

/// Strip markup left in a text run: HTML tags, bold/italic quotes, entities
/// and redundant whitespace.
pub fn clean_text(raw: &str) -> String {
    let without_tags = HTML_TAG.replace_all(raw, "");
    let without_quotes = BOLD_ITALIC.replace_all(&without_tags, "");
    let decoded = decode_entities(&without_quotes);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn render_into(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => match el.kind {
                NodeKind::Link => {
                    let mut target = String::new();
                    render_into(&el.args, &mut target);
                    let lowered = target.trim_start_matches(':').to_lowercase();
                    if !target.starts_with(':')
                        && DROPPED_LINK_NAMESPACES.iter().any(|ns| lowered.starts_with(ns))
                    {
                        continue;
                    }
                    if el.children.is_empty() {
                        out.push_str(target.trim_start_matches(':'));
                    } else {
                        render_into(&el.children, out);
                    }
                }
                NodeKind::List(_) => {}
                _ => {
                    render_into(&el.args, out);
                    render_into(&el.children, out);
                }
            },
        }
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wikitext::parse::parse_inline;

    #[test]
    fn links_render_display_or_target() {
        assert_eq!(clean_nodes(&parse_inline("[[house]], [[home|Home]]")), "house, Home");
    }

    #[test]
    fn category_links_are_dropped() {
        assert_eq!(clean_nodes(&parse_inline("word[[Category:English nouns]]")), "word");
        assert_eq!(
            clean_nodes(&parse_inline("[[:Category:English nouns]]")),
            "Category:English nouns"
        );
    }

    #[test]
    fn html_and_entities_are_cleaned() {
        assert_eq!(clean_text("<b>big</b>&nbsp;&amp; <i>small</i>"), "big & small");
        assert_eq!(clean_text("'''bold''' and ''italic''"), "bold and italic");
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(clean_text("  a \n\t b  "), "a b");
    }

    #[test]
    fn sentinels_survive_cleaning() {
        assert_eq!(clean_text("дом (XLITSdomXLITE)"), "дом (XLITSdomXLITE)");
    }
}
