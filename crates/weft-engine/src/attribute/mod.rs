//! Attribute grammar and typed parsing.
//!
//! Directive attributes follow `PREFIX NAME ([TAG])? (.MODIFIER)* = VALUE`.
//! The structural part (name, tag, modifier keys) of a physical attribute
//! never changes, so it is parsed once and memoized per node and attribute
//! name. Values are re-read and modifiers re-coerced on every access.

mod syntax;
mod typing;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use weft_dom::NodeId;

pub use syntax::{AttributeSyntax, Modifier};
pub use typing::{
    BooleanTyping, Coerced, DurationTyping, NumberTyping, StringTyping, TypedValue, Typing,
    Typings,
};

use crate::Renderer;

/// Reference to a physical attribute: its element and its name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    pub node: NodeId,
    pub name: String,
}

/// Attribute parsed against a directive.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedAttribute {
    pub attribute: AttributeRef,
    pub name: String,
    pub tag: Option<String>,
    /// Current value, or the directive default when empty.
    pub value: String,
    /// Typed modifiers. Undeclared modifiers are `Boolean(true)` when bare and
    /// `String` otherwise; declared ones follow their [`Typing`].
    pub modifiers: BTreeMap<String, TypedValue>,
}

/// How an attribute is parsed: the directive's prefix, schema and default.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParseOptions<'a> {
    pub prefix: &'a str,
    pub typings: Option<&'a Typings>,
    pub default_value: Option<&'a str>,
    /// Directive named in coercion warnings.
    pub directive: Option<&'a str>,
}

type SyntaxKey = (NodeId, String, String);

/// Memo of attribute structures, keyed by node, attribute name and prefix.
///
/// Entries live as long as their node: at most one per attribute name and
/// prefix seen on it. [`Renderer::forget`] drops a subtree's entries.
#[derive(Default)]
pub(crate) struct SyntaxMemo {
    entries: RefCell<HashMap<SyntaxKey, Option<AttributeSyntax>>>,
}

impl SyntaxMemo {
    fn get_or_parse(&self, node: NodeId, attribute: &str, prefix: &str) -> Option<AttributeSyntax> {
        let key = (node, attribute.to_owned(), prefix.to_owned());
        if let Some(syntax) = self.entries.borrow().get(&key) {
            return syntax.clone();
        }
        let syntax = AttributeSyntax::parse(attribute, prefix);
        self.entries.borrow_mut().insert(key, syntax.clone());
        syntax
    }

    pub(crate) fn forget(&self, node: NodeId) {
        self.entries.borrow_mut().retain(|(n, _, _), _| *n != node);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl Renderer {
    /// Parse an attribute of a node.
    ///
    /// Returns `None` when the attribute is gone or does not follow the
    /// grammar for `options.prefix`. Coercion warnings go to the warning sink.
    pub fn parse_attribute(
        &self,
        attribute: &AttributeRef,
        options: ParseOptions<'_>,
    ) -> Option<ParsedAttribute> {
        let raw_value = self
            .document()
            .attribute(attribute.node, &attribute.name)?
            .to_owned();
        let Some(syntax) =
            self.inner
                .syntax
                .get_or_parse(attribute.node, &attribute.name, options.prefix)
        else {
            self.warn(
                Some(attribute.node),
                options.directive,
                format!("malformed attribute name {}", attribute.name),
            );
            return None;
        };

        let value = match options.default_value {
            Some(default) if raw_value.is_empty() => default.to_owned(),
            _ => raw_value,
        };

        let mut modifiers = BTreeMap::new();
        for modifier in &syntax.modifiers {
            if options.typings.and_then(|t| t.get(&modifier.key)).is_none() {
                let value = match &modifier.raw {
                    Some(raw) => TypedValue::String(raw.clone()),
                    None => TypedValue::Boolean(true),
                };
                modifiers.insert(modifier.key.clone(), value);
            }
        }
        for (key, typing) in options.typings.into_iter().flat_map(Typings::iter) {
            let raw = syntax.modifier(key).map(|raw| raw.unwrap_or_default());
            let coerced = typing.coerce(raw);
            if let Some(warning) = coerced.warning {
                self.warn(
                    Some(attribute.node),
                    options.directive,
                    format!("{}: {warning}", attribute.name),
                );
            }
            if let Some(value) = coerced.value {
                modifiers.insert(key.clone(), value);
            }
        }

        Some(ParsedAttribute {
            attribute: attribute.clone(),
            name: syntax.name,
            tag: syntax.tag,
            value,
            modifiers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RendererOptions, Warning};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;
    use std::time::Duration;
    use weft_dom::Document;

    fn setup(markup: &str) -> (Renderer, NodeId, Rc<RefCell<Vec<Warning>>>) {
        let mut doc = Document::new();
        let fragment = doc.parse_fragment(markup).unwrap();
        let node = doc.children(fragment)[0];
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&warnings);
        let options = RendererOptions::default()
            .with_warnings(move |warning: &Warning| sink.borrow_mut().push(warning.clone()));
        let renderer = Renderer::new(Rc::new(RefCell::new(doc)), options);
        (renderer, node, warnings)
    }

    fn typings() -> Typings {
        Typings::new()
            .with(
                "once",
                Typing::Boolean(BooleanTyping {
                    default: false,
                    enforce: true,
                }),
            )
            .with(
                "debounce",
                Typing::Duration(DurationTyping {
                    default: Some(Duration::from_millis(250)),
                    enforce: false,
                }),
            )
    }

    #[test]
    fn test_parse_typed_modifiers() {
        let (renderer, node, _) = setup(r#"<a @click.debounce[1s].prevent="go()"/>"#);
        let typings = typings();
        let parsed = renderer
            .parse_attribute(
                &AttributeRef {
                    node,
                    name: "@click.debounce[1s].prevent".to_owned(),
                },
                ParseOptions {
                    prefix: "@",
                    typings: Some(&typings),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(parsed.name, "click");
        assert_eq!(parsed.value, "go()");
        assert_eq!(
            parsed.modifiers,
            BTreeMap::from([
                ("debounce".to_owned(), TypedValue::Duration(Duration::from_secs(1))),
                ("once".to_owned(), TypedValue::Boolean(false)),
                ("prevent".to_owned(), TypedValue::Boolean(true)),
            ])
        );
    }

    #[test]
    fn test_bare_typed_boolean_takes_default() {
        let (renderer, node, warnings) = setup(r#"<a @click.once="go()"/>"#);
        let typings = typings();
        let parsed = renderer
            .parse_attribute(
                &AttributeRef {
                    node,
                    name: "@click.once".to_owned(),
                },
                ParseOptions {
                    prefix: "@",
                    typings: Some(&typings),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(parsed.modifiers.get("once"), Some(&TypedValue::Boolean(false)));
        assert!(warnings.borrow().is_empty());
    }

    #[test]
    fn test_value_is_reread_and_defaulted() {
        let (renderer, node, _) = setup(r#"<p *text=""/>"#);
        let attribute = AttributeRef {
            node,
            name: "*text".to_owned(),
        };
        let options = ParseOptions {
            prefix: "*text",
            default_value: Some("fallback"),
            ..Default::default()
        };
        assert_eq!(
            renderer.parse_attribute(&attribute, options).unwrap().value,
            "fallback"
        );

        renderer
            .document_mut()
            .set_attribute(node, "*text", "live")
            .unwrap();
        assert_eq!(renderer.parse_attribute(&attribute, options).unwrap().value, "live");
        assert_eq!(renderer.inner.syntax.len(), 1);
    }

    #[test]
    fn test_coercion_warning_reaches_sink() {
        let (renderer, node, warnings) = setup(r#"<a @click.once[maybe]="x"/>"#);
        let typings = typings();
        renderer.parse_attribute(
            &AttributeRef {
                node,
                name: "@click.once[maybe]".to_owned(),
            },
            ParseOptions {
                prefix: "@",
                typings: Some(&typings),
                directive: Some("@event"),
                ..Default::default()
            },
        );
        let warnings = warnings.borrow();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].directive.as_deref(), Some("@event"));
        assert!(warnings[0].message.contains("maybe"));
    }

    #[test]
    fn test_missing_attribute() {
        let (renderer, node, _) = setup("<a/>");
        let attribute = AttributeRef {
            node,
            name: "*if".to_owned(),
        };
        assert_eq!(
            renderer.parse_attribute(
                &attribute,
                ParseOptions {
                    prefix: "*if",
                    ..Default::default()
                }
            ),
            None
        );
    }
}
