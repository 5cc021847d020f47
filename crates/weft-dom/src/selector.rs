//! Compound selector matching.
//!
//! Supports a single compound selector: an optional tag name followed by any
//! number of `#id`, `.class`, `[attr]` and `[attr=value]` parts. Combinators
//! are not supported.

use crate::{Document, DomError, NodeFilter, NodeId};

/// One condition of a compound selector.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Tag(String),
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
}

/// Parsed compound selector.
///
/// # Example
///
/// ```
/// use weft_dom::{Document, Selector};
///
/// let mut doc = Document::new();
/// let fragment = doc.parse_fragment(r#"<div><p class="a b" data-x="1"/></div>"#).unwrap();
/// let selector = Selector::parse(r#"p.b[data-x="1"]"#).unwrap();
/// let found = doc.query_selector(fragment, &selector).unwrap();
/// assert_eq!(doc.tag_name(found), Some("p"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<Part>,
}

impl Selector {
    /// Parse a compound selector.
    pub fn parse(source: &str) -> Result<Self, DomError> {
        let invalid = || DomError::InvalidSelector(source.to_owned());
        let mut parts = Vec::new();
        let mut rest = source.trim();
        if rest.is_empty() {
            return Err(invalid());
        }

        while let Some(c) = rest.chars().next() {
            match c {
                '#' | '.' => {
                    let (ident, tail) = split_ident(&rest[1..]);
                    if ident.is_empty() {
                        return Err(invalid());
                    }
                    parts.push(if c == '#' {
                        Part::Id(ident.to_owned())
                    } else {
                        Part::Class(ident.to_owned())
                    });
                    rest = tail;
                }
                '[' => {
                    let end = rest.find(']').ok_or_else(invalid)?;
                    let inner = &rest[1..end];
                    let part = match inner.split_once('=') {
                        Some((name, value)) => Part::Attribute {
                            name: name.trim().to_owned(),
                            value: Some(unquote(value.trim()).to_owned()),
                        },
                        None => Part::Attribute {
                            name: inner.trim().to_owned(),
                            value: None,
                        },
                    };
                    if matches!(&part, Part::Attribute { name, .. } if name.is_empty()) {
                        return Err(invalid());
                    }
                    parts.push(part);
                    rest = &rest[end + 1..];
                }
                _ if parts.is_empty() => {
                    let (ident, tail) = split_ident(rest);
                    if ident.is_empty() {
                        return Err(invalid());
                    }
                    parts.push(Part::Tag(ident.to_ascii_lowercase()));
                    rest = tail;
                }
                _ => return Err(invalid()),
            }
        }

        Ok(Self { parts })
    }

    /// Whether an element matches every part of the selector.
    #[must_use]
    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(tag) = document.tag_name(node) else {
            return false;
        };
        self.parts.iter().all(|part| match part {
            Part::Tag(expected) => tag.eq_ignore_ascii_case(expected),
            Part::Id(id) => document.attribute(node, "id") == Some(id.as_str()),
            Part::Class(class) => document
                .attribute(node, "class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)),
            Part::Attribute { name, value } => match (document.attribute(node, name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
        })
    }
}

fn split_ident(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len());
    s.split_at(end)
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(s)
}

impl Document {
    /// First descendant element of `root` matching `selector`, in document order.
    #[must_use]
    pub fn query_selector(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        self.walk(root, NodeFilter::ELEMENT)
            .find(|&node| selector.matches(self, node))
    }

    /// All descendant elements of `root` matching `selector`.
    #[must_use]
    pub fn query_selector_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.walk(root, NodeFilter::ELEMENT)
            .filter(|&node| selector.matches(self, node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_compound() {
        let selector = Selector::parse("div#main.a.b[data-x='1'][hidden]").unwrap();
        assert_eq!(
            selector.parts,
            vec![
                Part::Tag("div".to_owned()),
                Part::Id("main".to_owned()),
                Part::Class("a".to_owned()),
                Part::Class("b".to_owned()),
                Part::Attribute {
                    name: "data-x".to_owned(),
                    value: Some("1".to_owned())
                },
                Part::Attribute {
                    name: "hidden".to_owned(),
                    value: None
                },
            ]
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("#").is_err());
        assert!(Selector::parse("[unclosed").is_err());
        assert!(Selector::parse("div > p").is_err());
    }

    #[test]
    fn test_query_selector_all() {
        let mut doc = Document::new();
        let fragment = doc
            .parse_fragment(r#"<ul><li class="x">1</li><li>2</li><li class="y x">3</li></ul>"#)
            .unwrap();
        let selector = Selector::parse("li.x").unwrap();
        let found = doc.query_selector_all(fragment, &selector);
        let texts: Vec<_> = found.iter().map(|&n| doc.text_content(n)).collect();
        assert_eq!(texts, vec!["1", "3"]);
    }

    #[test]
    fn test_query_selector_excludes_root() {
        let mut doc = Document::new();
        let fragment = doc.parse_fragment("<p><p/></p>").unwrap();
        let outer = doc.children(fragment)[0];
        let inner = doc.query_selector(outer, &Selector::parse("p").unwrap());
        assert_eq!(inner, Some(doc.children(outer)[0]));
    }
}
