//! Error types for tree operations.

use std::str::Utf8Error;

use crate::NodeId;

/// Error raised by [`Document`](crate::Document) operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DomError {
    /// The operation requires an element node.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    /// The operation requires a node that is attached to a parent.
    #[error("node {0} has no parent")]
    Detached(NodeId),

    /// The insertion would make a node its own ancestor.
    #[error("cannot insert node {child} into its own descendant {parent}")]
    HierarchyRequest {
        /// Node that would become the parent.
        parent: NodeId,
        /// Node being inserted.
        child: NodeId,
    },

    /// The reference node is not a child of the given parent.
    #[error("node {reference} is not a child of {parent}")]
    NotAChild {
        /// Expected parent.
        parent: NodeId,
        /// Reference child.
        reference: NodeId,
    },

    /// Selector could not be parsed.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Markup parsing error.
    #[error("markup parse error")]
    Xml(#[from] quick_xml::Error),

    /// Markup attribute error.
    #[error("markup attribute error")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Encoding error during markup parsing.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// UTF-8 decoding error.
    #[error("UTF-8 error")]
    Utf8(#[from] Utf8Error),
}
