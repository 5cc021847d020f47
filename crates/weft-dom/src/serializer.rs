//! HTML serialization.

use crate::{Document, NodeId, NodeKind};

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

impl Document {
    /// Serialize a node and its descendants.
    ///
    /// Fragments serialize as the concatenation of their children.
    #[must_use]
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_node(id, &mut out);
        out
    }

    /// Serialize the children of a node.
    #[must_use]
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.serialize_node(child, &mut out);
        }
        out
    }

    fn serialize_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Fragment => {
                for &child in self.children(id) {
                    self.serialize_node(child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for attr in attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if !attr.value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(&attr.value));
                        out.push('"');
                    }
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }

                for &child in self.children(id) {
                    self.serialize_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

/// Escape special characters in text content.
fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape special characters in attribute values.
fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_element_with_attributes() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "title", r#"say "hi" & bye"#).unwrap();
        doc.set_attribute(div, "hidden", "").unwrap();
        let text = doc.create_text("1 < 2");
        doc.append_child(div, text).unwrap();

        assert_eq!(
            doc.outer_html(div),
            r#"<div title="say &quot;hi&quot; &amp; bye" hidden>1 &lt; 2</div>"#
        );
    }

    #[test]
    fn test_serialize_void_and_comment() {
        let mut doc = Document::new();
        let fragment = doc.parse_fragment("<p>a<br/>b<!--note--></p>").unwrap();
        assert_eq!(doc.inner_html(fragment), "<p>a<br>b<!--note--></p>");
    }

    #[test]
    fn test_serialize_empty_element() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        assert_eq!(doc.outer_html(div), "<div></div>");
    }
}
