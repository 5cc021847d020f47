//! Reversible element/placeholder morphing and keyed expansion.
//!
//! Structural directives take an element out of the tree by swapping it for a
//! comment placeholder. The renderer remembers which element each placeholder
//! stands for, so traversal can keep matching the element's attributes while
//! only the placeholder is attached.

use std::collections::{HashMap, HashSet};

use weft_dom::{DomError, NodeId};

use crate::{MorphError, Renderer};

/// What a placeholder stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placeholder {
    /// Detached element the placeholder replaces.
    pub original: NodeId,
    /// Directive that created the placeholder.
    pub directive: String,
    /// Expression that directive was evaluating.
    pub expression: String,
}

/// One node generated by [`Renderer::expand`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    pub key: String,
    pub node: NodeId,
    /// Whether the node was cloned by this call rather than reused.
    pub created: bool,
}

/// Identity map between placeholders, originals and expansion instances.
#[derive(Default)]
pub(crate) struct MorphMap {
    placeholders: HashMap<NodeId, Placeholder>,
    originals: HashMap<NodeId, NodeId>,
    expansions: HashMap<NodeId, Vec<(String, NodeId)>>,
    instances: HashSet<NodeId>,
}

impl MorphMap {
    pub(crate) fn original(&self, placeholder: NodeId) -> Option<NodeId> {
        self.placeholders.get(&placeholder).map(|p| p.original)
    }

    pub(crate) fn placeholder(&self, original: NodeId) -> Option<NodeId> {
        self.originals.get(&original).copied()
    }

    pub(crate) fn forget(&mut self, node: NodeId) {
        if let Some(placeholder) = self.placeholders.remove(&node) {
            self.originals.remove(&placeholder.original);
        }
        if let Some(placeholder) = self.originals.remove(&node) {
            self.placeholders.remove(&placeholder);
        }
        if let Some(instances) = self.expansions.remove(&node) {
            for (_, instance) in instances {
                self.instances.remove(&instance);
            }
        }
        if self.instances.remove(&node) {
            for instances in self.expansions.values_mut() {
                instances.retain(|(_, instance)| *instance != node);
            }
        }
    }
}

impl Renderer {
    /// Replace `element` with a placeholder comment and return the placeholder.
    ///
    /// Deactivating an element that already has a placeholder returns that
    /// placeholder unchanged. Watches inside the detached subtree are dropped;
    /// reactivation renders it again.
    pub fn deactivate(
        &self,
        element: NodeId,
        directive: &str,
        expression: &str,
    ) -> Result<NodeId, MorphError> {
        if let Some(placeholder) = self.placeholder(element) {
            return Ok(placeholder);
        }
        let placeholder = {
            let mut document = self.document_mut();
            if !document.is_element(element) {
                return Err(MorphError::NotAnElement(element));
            }
            let placeholder = document.create_comment(format!("[weft] {directive}=\"{expression}\""));
            document.replace(element, placeholder)?;
            placeholder
        };

        let mut morph = self.inner.morph.borrow_mut();
        morph.placeholders.insert(
            placeholder,
            Placeholder {
                original: element,
                directive: directive.to_owned(),
                expression: expression.to_owned(),
            },
        );
        morph.originals.insert(element, placeholder);
        drop(morph);
        for node in self.subtree(element) {
            self.unwatch(node);
        }
        tracing::trace!(element = %element, placeholder = %placeholder, directive, "Deactivated element");
        Ok(placeholder)
    }

    /// Put the original element back in place of `placeholder`.
    pub fn reactivate(&self, placeholder: NodeId) -> Result<NodeId, MorphError> {
        let original = self
            .original(placeholder)
            .ok_or(MorphError::UnknownPlaceholder(placeholder))?;
        self.document_mut().replace(placeholder, original)?;

        let mut morph = self.inner.morph.borrow_mut();
        morph.placeholders.remove(&placeholder);
        morph.originals.remove(&original);
        tracing::trace!(element = %original, placeholder = %placeholder, "Reactivated element");
        Ok(original)
    }

    /// Whether `node` is a placeholder created by this renderer.
    #[must_use]
    pub fn is_placeholder(&self, node: NodeId) -> bool {
        self.inner.morph.borrow().placeholders.contains_key(&node)
    }

    /// Element a placeholder stands for.
    #[must_use]
    pub fn original(&self, placeholder: NodeId) -> Option<NodeId> {
        self.inner.morph.borrow().original(placeholder)
    }

    /// Placeholder currently standing for `element`.
    #[must_use]
    pub fn placeholder(&self, element: NodeId) -> Option<NodeId> {
        self.inner.morph.borrow().placeholder(element)
    }

    /// Diagnostic record of a placeholder.
    #[must_use]
    pub fn placeholder_info(&self, placeholder: NodeId) -> Option<Placeholder> {
        self.inner.morph.borrow().placeholders.get(&placeholder).cloned()
    }

    /// Whether `node` was generated by [`Renderer::expand`].
    #[must_use]
    pub fn is_instance(&self, node: NodeId) -> bool {
        self.inner.morph.borrow().instances.contains(&node)
    }

    /// The node attribute lookups should use: the original for placeholders.
    pub(crate) fn resolve(&self, node: NodeId) -> NodeId {
        self.original(node).unwrap_or(node)
    }

    /// Reconcile the instances following `anchor` with `keys`.
    ///
    /// Instances whose key is still present are reused and moved into key
    /// order; new keys get a deep clone of `template`; instances whose key is
    /// gone are removed and forgotten.
    pub fn expand(
        &self,
        anchor: NodeId,
        keys: &[String],
        template: NodeId,
    ) -> Result<Vec<Instance>, MorphError> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = keys.iter().find(|key| !seen.insert(key.as_str())) {
            return Err(MorphError::DuplicateKey(duplicate.clone()));
        }

        let (instances, vanished) = {
            let mut document = self.document_mut();
            if !document.is_element(template) {
                return Err(MorphError::NotAnElement(template));
            }
            if document.parent(anchor).is_none() {
                return Err(DomError::Detached(anchor).into());
            }

            let mut morph = self.inner.morph.borrow_mut();
            let mut previous: HashMap<String, NodeId> = morph
                .expansions
                .remove(&anchor)
                .unwrap_or_default()
                .into_iter()
                .collect();

            let mut instances = Vec::with_capacity(keys.len());
            let mut cursor = anchor;
            for key in keys {
                let (node, created) = match previous.remove(key) {
                    Some(node) => (node, false),
                    None => (document.clone_node(template, true), true),
                };
                document.insert_after(cursor, node)?;
                cursor = node;
                morph.instances.insert(node);
                instances.push(Instance {
                    key: key.clone(),
                    node,
                    created,
                });
            }
            morph.expansions.insert(
                anchor,
                instances.iter().map(|i| (i.key.clone(), i.node)).collect(),
            );

            let vanished: Vec<NodeId> = previous.into_values().collect();
            for &node in &vanished {
                document.detach(node);
            }
            (instances, vanished)
        };

        tracing::trace!(
            anchor = %anchor,
            instances = instances.len(),
            removed = vanished.len(),
            "Expanded template"
        );
        for node in vanished {
            self.forget(node);
        }
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RendererOptions;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use weft_dom::Document;

    fn renderer(markup: &str) -> (Renderer, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_markup(markup).unwrap();
        (
            Renderer::new(Rc::new(RefCell::new(doc)), RendererOptions::default()),
            root,
        )
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|&k| k.to_owned()).collect()
    }

    #[test]
    fn test_round_trip_keeps_identity_and_position() {
        let (renderer, root) = renderer(r#"<a/><b x="1"><i/></b><c/>"#);
        let b = renderer.document().children(root)[1];

        let placeholder = renderer.deactivate(b, "*if", "count > 0").unwrap();
        assert_eq!(
            renderer.document().outer_html(root),
            r#"<a></a><!--[weft] *if="count > 0"--><c></c>"#
        );
        assert!(renderer.is_placeholder(placeholder));
        assert_eq!(renderer.original(placeholder), Some(b));
        assert_eq!(renderer.placeholder(b), Some(placeholder));

        let restored = renderer.reactivate(placeholder).unwrap();
        assert_eq!(restored, b);
        assert_eq!(renderer.document().children(root)[1], b);
        assert!(!renderer.is_placeholder(placeholder));
        assert_eq!(renderer.placeholder(b), None);
        assert_eq!(renderer.document().attribute(b, "x"), Some("1"));
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let (renderer, root) = renderer("<p/>");
        let p = renderer.document().children(root)[0];
        let first = renderer.deactivate(p, "*if", "x").unwrap();
        let second = renderer.deactivate(p, "*if", "x").unwrap();
        assert_eq!(first, second);
        assert_eq!(renderer.document().children(root), &[first]);
    }

    #[test]
    fn test_placeholder_info() {
        let (renderer, root) = renderer("<p/>");
        let p = renderer.document().children(root)[0];
        let placeholder = renderer.deactivate(p, "*if", "ready").unwrap();
        assert_eq!(
            renderer.placeholder_info(placeholder),
            Some(Placeholder {
                original: p,
                directive: "*if".to_owned(),
                expression: "ready".to_owned(),
            })
        );
    }

    #[test]
    fn test_reactivate_unknown_placeholder() {
        let (renderer, root) = renderer("<!--plain--><p/>");
        let comment = renderer.document().children(root)[0];
        assert!(matches!(
            renderer.reactivate(comment),
            Err(MorphError::UnknownPlaceholder(node)) if node == comment
        ));
        let text = renderer.document_mut().create_text("t");
        assert!(matches!(
            renderer.deactivate(text, "*if", "x"),
            Err(MorphError::NotAnElement(_))
        ));
    }

    #[test]
    fn test_expand_reuses_keyed_instances() {
        let (renderer, root) = renderer("<li/><end/>");
        let li = renderer.document().children(root)[0];
        let anchor = renderer.deactivate(li, "*for", "x of items").unwrap();

        let first = renderer.expand(anchor, &keys(&["1", "2", "3"]), li).unwrap();
        assert!(first.iter().all(|i| i.created));
        let nodes: Vec<NodeId> = first.iter().map(|i| i.node).collect();
        assert_eq!(renderer.document().children(root)[1..4], nodes[..]);

        let cache = renderer.cache::<u32>("marks").unwrap();
        cache.insert(nodes[1], 2);

        let second = renderer.expand(anchor, &keys(&["3", "1"]), li).unwrap();
        assert_eq!(
            second,
            vec![
                Instance {
                    key: "3".to_owned(),
                    node: nodes[2],
                    created: false
                },
                Instance {
                    key: "1".to_owned(),
                    node: nodes[0],
                    created: false
                },
            ]
        );
        let children = renderer.document().children(root).to_vec();
        assert_eq!(children[1..3], [nodes[2], nodes[0]]);
        assert_eq!(children.len(), 4);
        assert_eq!(renderer.document().parent(nodes[1]), None);
        assert!(!renderer.is_instance(nodes[1]));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expand_rejects_duplicate_keys() {
        let (renderer, root) = renderer("<li/>");
        let li = renderer.document().children(root)[0];
        let anchor = renderer.deactivate(li, "*for", "x of items").unwrap();
        assert!(matches!(
            renderer.expand(anchor, &keys(&["a", "a"]), li),
            Err(MorphError::DuplicateKey(key)) if key == "a"
        ));
    }
}
