/// A node in the parsed page tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// Section heading, `==` is level 2
    Heading(u8),
    /// Run of list lines sharing a marker prefix such as `*` or `#:`
    List(String),
    ListItem(String),
    /// `[[target|display]]`: args hold the target, children the display text
    Link,
}

/// Structural node. `args` carries label-like content (heading titles, link
/// targets); `children` carries the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: NodeKind,
    pub args: Vec<Node>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(kind: NodeKind) -> Self {
        Element {
            kind,
            args: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, NodeKind::List(_))
    }

    /// True if any descendant (not counting `self`) is a list.
    pub fn contains_list(&self) -> bool {
        self.args
            .iter()
            .chain(self.children.iter())
            .any(|node| match node {
                Node::Element(el) => el.is_list() || el.contains_list(),
                Node::Text(_) => false,
            })
    }

    /// A list with no nested list anywhere below it.
    pub fn is_terminal_list(&self) -> bool {
        self.is_list() && !self.contains_list()
    }

    pub fn list_marker(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::List(marker) | NodeKind::ListItem(marker) => Some(marker.as_str()),
            _ => None,
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}
