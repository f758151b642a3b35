//! Minimal wikitext front end: template expansion, tree parsing and
//! node-to-text cleaning.

pub mod clean;
pub mod expand;
pub mod node;
pub mod parse;

pub use clean::{clean_nodes, clean_text};
pub use expand::expand;
pub use node::{Element, Node, NodeKind};
pub use parse::parse;
