//! Node-type filtered tree walking.

use std::ops::BitOr;

use crate::{Document, NodeId, NodeType};

/// Set of node types a [`TreeWalker`] yields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeFilter(u8);

impl NodeFilter {
    /// Yield element nodes.
    pub const ELEMENT: Self = Self(1);
    /// Yield text nodes.
    pub const TEXT: Self = Self(1 << 2);
    /// Yield comment nodes.
    pub const COMMENT: Self = Self(1 << 7);
    /// Yield every node type except fragments.
    pub const ALL: Self = Self(1 | (1 << 2) | (1 << 7));

    /// Whether nodes of this type are accepted.
    #[must_use]
    pub fn accepts(self, node_type: NodeType) -> bool {
        let bit = match node_type {
            NodeType::Element => Self::ELEMENT.0,
            NodeType::Text => Self::TEXT.0,
            NodeType::Comment => Self::COMMENT.0,
            NodeType::Fragment => return false,
        };
        self.0 & bit != 0
    }
}

impl BitOr for NodeFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Pre-order walker over the descendants of a root node.
///
/// The root itself is not yielded. The walker snapshots nothing: it follows the
/// live tree, so mutations between calls to `next` are observed.
pub struct TreeWalker<'a> {
    document: &'a Document,
    root: NodeId,
    current: NodeId,
    filter: NodeFilter,
}

impl<'a> TreeWalker<'a> {
    /// Create a walker below `root` yielding nodes accepted by `filter`.
    #[must_use]
    pub fn new(document: &'a Document, root: NodeId, filter: NodeFilter) -> Self {
        Self {
            document,
            root,
            current: root,
            filter,
        }
    }

    fn advance(&self, from: NodeId) -> Option<NodeId> {
        if let Some(&first) = self.document.children(from).first() {
            return Some(first);
        }
        let mut node = from;
        while node != self.root {
            if let Some(next) = self.document.next_sibling(node) {
                return Some(next);
            }
            node = self.document.parent(node)?;
        }
        None
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let next = self.advance(self.current)?;
            self.current = next;
            if self.filter.accepts(self.document.node_type(next)) {
                return Some(next);
            }
        }
    }
}

impl Document {
    /// Walk the descendants of `root` in document order.
    #[must_use]
    pub fn walk(&self, root: NodeId, filter: NodeFilter) -> TreeWalker<'_> {
        TreeWalker::new(self, root, filter)
    }
}
