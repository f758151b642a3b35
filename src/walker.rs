//! Generic "classify heading, carry context, emit at leaf lists" tree walk.
//!
//! The context is an owned value threaded through the walk: a heading hands
//! its subtree a new context, and whatever context comes back out of that
//! subtree is what the following siblings see.

use crate::wikitext::{clean_nodes, Element, Node, NodeKind};

/// What to do at a heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descent<C> {
    /// Walk the heading's children with this context
    Into(C),
    /// Leave the subtree unread and keep the current context
    Skip,
}

/// Per-page-kind behaviour plugged into [`walk`].
pub trait SectionRules {
    type Context;
    type Output;

    fn enter_heading(&self, level: u8, label: &str, ctx: &Self::Context)
        -> Descent<Self::Context>;

    /// Whether `list` is read by [`SectionRules::emit_list`] instead of being
    /// descended into. Defaults to lists without nested lists.
    fn is_leaf(&self, list: &Element) -> bool {
        list.is_terminal_list()
    }

    fn emit_list(&self, list: &Element, ctx: &Self::Context, out: &mut Vec<Self::Output>);

    /// Text outside lists and headings. The returned context replaces `ctx`.
    fn read_text(&self, _text: &str, ctx: Self::Context) -> Self::Context {
        ctx
    }
}

/// Walk `nodes` in order, returning the context left after the last one.
pub fn walk<R: SectionRules>(
    rules: &R,
    nodes: &[Node],
    ctx: R::Context,
    out: &mut Vec<R::Output>,
) -> R::Context {
    nodes
        .iter()
        .fold(ctx, |ctx, node| walk_node(rules, node, ctx, out))
}

fn walk_node<R: SectionRules>(
    rules: &R,
    node: &Node,
    ctx: R::Context,
    out: &mut Vec<R::Output>,
) -> R::Context {
    let el = match node {
        Node::Element(el) => el,
        Node::Text(text) => return rules.read_text(text, ctx),
    };
    match &el.kind {
        NodeKind::Heading(level) => {
            let label = clean_nodes(&el.args);
            match rules.enter_heading(*level, &label, &ctx) {
                Descent::Into(inner) => walk(rules, &el.children, inner, out),
                Descent::Skip => ctx,
            }
        }
        NodeKind::List(_) if rules.is_leaf(el) => {
            rules.emit_list(el, &ctx, out);
            ctx
        }
        _ => {
            let ctx = walk(rules, &el.args, ctx, out);
            walk(rules, &el.children, ctx, out)
        }
    }
}

/// Cleaned text of each item directly under `list`, skipping nested lists.
pub fn list_item_texts(list: &Element) -> impl Iterator<Item = String> + '_ {
    list.child_elements()
        .filter(|el| matches!(el.kind, NodeKind::ListItem(_)))
        .map(|item| clean_nodes(&item.children))
}
