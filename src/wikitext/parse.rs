//! Line-oriented parser from (expanded) wikitext to a section/list tree.

use super::node::{Element, Node, NodeKind};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HEADING_LINE: Regex = Regex::new(r"^(={1,6})\s*(.+?)\s*(={1,6})\s*$").unwrap();
    static ref LIST_LINE: Regex = Regex::new(r"^([*#:;]+)\s*(.*)$").unwrap();
}

/// List markers past this depth are kept as item text.
pub const MAX_LIST_DEPTH: usize = 32;

/// Links nested in link captions deeper than this stay text.
const MAX_LINK_DEPTH: usize = 8;

/// Parse a page body into a `Root` element. Headings nest by level, runs of
/// list lines become `List` elements and everything else is inline text.
pub fn parse(text: &str) -> Element {
    let mut builder = TreeBuilder::new();
    let mut pending_list: Vec<(&str, &str)> = Vec::new();

    for line in text.lines() {
        if let Some(cap) = LIST_LINE.captures(line) {
            let prefix = cap.get(1).map_or("", |m| m.as_str());
            let content = cap.get(2).map_or("", |m| m.as_str());
            if prefix.len() > MAX_LIST_DEPTH {
                pending_list.push((&prefix[..MAX_LIST_DEPTH], &line[MAX_LIST_DEPTH..]));
            } else {
                pending_list.push((prefix, content));
            }
            continue;
        }

        if !pending_list.is_empty() {
            builder.push_all(build_lists(&pending_list, 0));
            pending_list.clear();
        }

        if let Some(cap) = HEADING_LINE.captures(line) {
            let open = cap[1].len();
            let close = cap[3].len();
            let level = open.min(close) as u8;
            builder.open_heading(level, parse_inline(&cap[2]));
        } else if !line.trim().is_empty() {
            let mut nodes = parse_inline(line);
            nodes.push(Node::Text("\n".to_string()));
            builder.push_all(nodes);
        }
    }

    if !pending_list.is_empty() {
        builder.push_all(build_lists(&pending_list, 0));
    }
    builder.finish()
}

/// Stack of open sections; the root is always at the bottom.
struct TreeBuilder {
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn new() -> Self {
        TreeBuilder {
            stack: vec![Element::new(NodeKind::Root)],
        }
    }

    fn push_all(&mut self, nodes: Vec<Node>) {
        if let Some(top) = self.stack.last_mut() {
            top.children.extend(nodes);
        }
    }

    fn open_heading(&mut self, level: u8, label: Vec<Node>) {
        while let Some(NodeKind::Heading(open_level)) = self.stack.last().map(|el| &el.kind) {
            if *open_level < level {
                break;
            }
            self.close_top();
        }
        let mut heading = Element::new(NodeKind::Heading(level));
        heading.args = label;
        self.stack.push(heading);
    }

    fn close_top(&mut self) {
        if self.stack.len() > 1 {
            if let Some(done) = self.stack.pop() {
                self.push_all(vec![done.into()]);
            }
        }
    }

    fn finish(mut self) -> Element {
        while self.stack.len() > 1 {
            self.close_top();
        }
        self.stack.pop().unwrap_or_else(|| Element::new(NodeKind::Root))
    }
}

/// Group list lines into nested lists. All `lines` have a prefix longer than
/// `depth`; a list collects consecutive lines sharing the marker at `depth`.
fn build_lists(lines: &[(&str, &str)], depth: usize) -> Vec<Node> {
    let mut lists = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let marker = lines[i].0.as_bytes()[depth];
        let list_prefix = &lines[i].0[..=depth];
        let mut list = Element::new(NodeKind::List(list_prefix.to_string()));

        while i < lines.len() && lines[i].0.as_bytes()[depth] == marker {
            let mut item = Element::new(NodeKind::ListItem(list_prefix.to_string()));
            if lines[i].0.len() == depth + 1 {
                item.children = parse_inline(lines[i].1);
                i += 1;
            }
            let nested_start = i;
            while i < lines.len()
                && lines[i].0.len() > depth + 1
                && lines[i].0.as_bytes()[depth] == marker
            {
                i += 1;
            }
            if nested_start < i {
                item.children
                    .extend(build_lists(&lines[nested_start..i], depth + 1));
            }
            list.children.push(item.into());
        }
        lists.push(list.into());
    }
    lists
}

// ─────────────────────────────────────────────────────────────────────────────
// Inline content: text and [[links]]
// ─────────────────────────────────────────────────────────────────────────────

/// Split a line into text runs and link elements.
pub fn parse_inline(text: &str) -> Vec<Node> {
    parse_inline_at(text, 0)
}

fn parse_inline_at(text: &str, depth: usize) -> Vec<Node> {
    let mut parser = InlineParser { text, pos: 0, depth };
    parser.parse_nodes()
}

struct InlineParser<'a> {
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> InlineParser<'a> {
    fn looking_at(&self, s: &str) -> bool {
        self.text[self.pos..].starts_with(s)
    }

    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn parse_nodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut text = String::new();
        while !self.at_end() {
            if self.looking_at("[[") {
                let start = self.pos;
                match self.parse_wikilink() {
                    Some(link) => {
                        if !text.is_empty() {
                            nodes.push(Node::Text(std::mem::take(&mut text)));
                        }
                        nodes.push(link.into());
                    }
                    None => {
                        self.pos = start;
                        text.push_str("[[");
                        self.pos += 2;
                    }
                }
            } else if let Some(c) = self.consume_char() {
                text.push(c);
            }
        }
        if !text.is_empty() {
            nodes.push(Node::Text(text));
        }
        nodes
    }

    // ─────────────────────────────────────────────────────────────
    // wikilink ::= "[[" target ("|" display)? "]]"
    // ─────────────────────────────────────────────────────────────
    fn parse_wikilink(&mut self) -> Option<Element> {
        if self.depth >= MAX_LINK_DEPTH {
            return None;
        }
        self.pos += 2;
        let mut target = String::new();
        while let Some(c) = self.peek_char() {
            if c == '|' || self.looking_at("]]") || self.looking_at("[[") {
                break;
            }
            target.push(c);
            self.pos += c.len_utf8();
        }

        let mut display = None;
        if self.looking_at("|") {
            self.pos += 1;
            let rest = &self.text[self.pos..];
            let end = rest.find("]]")?;
            display = Some(parse_inline_at(&rest[..end], self.depth + 1));
            self.pos += end;
        }

        if !self.looking_at("]]") {
            return None;
        }
        self.pos += 2;

        let mut link = Element::new(NodeKind::Link);
        link.args.push(Node::Text(target.trim().to_string()));
        link.children = display.unwrap_or_default();
        Some(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn headings(el: &Element) -> Vec<(u8, &Element)> {
        el.child_elements()
            .filter_map(|child| match child.kind {
                NodeKind::Heading(level) => Some((level, child)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn headings_nest_by_level() {
        let root = parse("==English==\n===Noun===\n* a\n===Verb===\n* b\n==French==\n");
        let top = headings(&root);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].1.args, vec![text("English")]);
        let english_children = headings(top[0].1);
        assert_eq!(english_children.len(), 2);
        assert_eq!(english_children[0].0, 3);
        assert_eq!(english_children[1].1.args, vec![text("Verb")]);
        assert_eq!(top[1].1.args, vec![text("French")]);
    }

    #[test]
    fn deeper_heading_after_shallower_closes_correctly() {
        let root = parse("====A====\n==B==\n");
        let top = headings(&root);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 4);
        assert_eq!(top[1].0, 2);
    }

    #[test]
    fn consecutive_list_lines_form_one_list() {
        let root = parse("* a\n* b\n");
        assert_eq!(root.children.len(), 1);
        let Node::Element(list) = &root.children[0] else {
            panic!("expected list")
        };
        assert_eq!(list.kind, NodeKind::List("*".to_string()));
        assert_eq!(list.children.len(), 2);
        assert!(list.is_terminal_list());
    }

    #[test]
    fn deeper_prefix_nests_inside_previous_item() {
        let root = parse("* a\n** b\n** c\n* d\n");
        let Node::Element(list) = &root.children[0] else {
            panic!("expected list")
        };
        assert_eq!(list.children.len(), 2);
        assert!(!list.is_terminal_list());
        let Node::Element(first) = &list.children[0] else {
            panic!("expected item")
        };
        let nested: Vec<&Element> = first.child_elements().collect();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].kind, NodeKind::List("**".to_string()));
        assert_eq!(nested[0].children.len(), 2);
    }

    #[test]
    fn different_markers_make_separate_lists() {
        let root = parse("# def\n* syn\n");
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn text_between_lists_splits_them() {
        let root = parse("* a\nsome text\n* b\n");
        let lists = root.child_elements().filter(|el| el.is_list()).count();
        assert_eq!(lists, 2);
    }

    #[test]
    fn inline_links_with_and_without_display() {
        let nodes = parse_inline("see [[house]] and [[home|Home]]");
        assert_eq!(nodes.len(), 4);
        let Node::Element(link) = &nodes[3] else {
            panic!("expected link")
        };
        assert_eq!(link.kind, NodeKind::Link);
        assert_eq!(link.args, vec![text("home")]);
        assert_eq!(link.children, vec![text("Home")]);
    }

    #[test]
    fn unclosed_link_stays_text() {
        assert_eq!(parse_inline("a [[b"), vec![text("a [[b")]);
    }

    #[test]
    fn list_depth_is_capped_and_extra_markers_become_text() {
        let line = format!("{} deep", "*".repeat(MAX_LIST_DEPTH + 3));
        let root = parse(&line);

        let mut depth = 0;
        let mut current = &root;
        while let Some(list) = current.child_elements().find(|el| el.is_list()) {
            depth += 1;
            let Some(item) = list.child_elements().next() else {
                panic!("list without item")
            };
            current = item;
        }
        assert_eq!(depth, MAX_LIST_DEPTH);
        assert_eq!(current.children, vec![text("*** deep")]);
    }

    #[test]
    fn very_deep_lists_parse_without_overflow() {
        let page = format!("{} x\n* y\n", "*".repeat(20_000));
        let root = parse(&page);
        assert!(root.contains_list());
    }

    #[test]
    fn link_captions_nest_only_so_far() {
        let line = format!("{}x{}", "[[a|".repeat(1_000), "]]".repeat(1_000));
        let nodes = parse_inline(&line);
        assert!(!nodes.is_empty());
    }
}
