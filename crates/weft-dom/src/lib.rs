//! Arena-backed element tree for the weft rendering engine.
//!
//! The engine never owns markup itself; it walks and mutates a [`Document`]
//! through stable [`NodeId`] handles. Nodes are never deallocated while the
//! document lives, so a handle stays valid after its node is detached. This is
//! what lets the engine swap an element for a placeholder comment and later put
//! the very same element back.
//!
//! # Example
//!
//! ```
//! use weft_dom::Document;
//!
//! let mut doc = Document::new();
//! let fragment = doc.parse_fragment(r#"<p class="lead">Hello <b>world</b></p>"#).unwrap();
//! let p = doc.children(fragment)[0];
//!
//! doc.set_attribute(p, "id", "greeting").unwrap();
//! assert_eq!(
//!     doc.outer_html(p),
//!     r#"<p class="lead" id="greeting">Hello <b>world</b></p>"#
//! );
//! ```

mod document;
mod error;
mod node;
mod parser;
mod selector;
mod serializer;
mod walker;

pub use document::Document;
pub use error::DomError;
pub use node::{Attribute, NodeId, NodeKind, NodeType};
pub use selector::Selector;
pub use walker::{NodeFilter, TreeWalker};
