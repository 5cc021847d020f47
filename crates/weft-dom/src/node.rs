//! Node handles and node payloads.

use std::fmt;

/// Stable handle to a node inside a [`Document`](crate::Document).
///
/// Handles are plain indices into the document arena. They are only meaningful
/// for the document that created them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena index of this node.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coarse node type, mirroring the DOM node types the engine cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Document or fragment root, holds children only.
    Fragment,
    /// Element with a tag name and attributes.
    Element,
    /// Character data.
    Text,
    /// Comment, also used for placeholder markers.
    Comment,
}

/// A single attribute on an element. Order of attributes is preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name exactly as written.
    pub name: String,
    /// Attribute value (empty for valueless attributes).
    pub value: String,
}

impl Attribute {
    /// Create a new attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Payload of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Document or fragment root.
    Fragment,
    /// Element node.
    Element {
        /// Tag name, lowercase by convention.
        tag: String,
        /// Attributes in source order.
        attributes: Vec<Attribute>,
    },
    /// Text node.
    Text(String),
    /// Comment node.
    Comment(String),
}

impl NodeKind {
    /// Coarse type of this payload.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Fragment => NodeType::Fragment,
            Self::Element { .. } => NodeType::Element,
            Self::Text(_) => NodeType::Text,
            Self::Comment(_) => NodeType::Comment,
        }
    }
}

/// Arena slot.
#[derive(Clone, Debug)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}
