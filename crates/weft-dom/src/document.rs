//! Arena document and tree mutation primitives.

use crate::node::NodeData;
use crate::{Attribute, DomError, NodeId, NodeKind, NodeType};

/// An element tree stored in an arena.
///
/// The document always has a [`root`](Self::root) fragment node. Nodes created
/// through `create_*` start detached and can be inserted anywhere. Detaching a
/// node never frees it, so [`NodeId`]s remain valid for the lifetime of the
/// document.
///
/// # Panics
///
/// Accessors index the arena directly and panic when handed a [`NodeId`] from
/// another document.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a fragment root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Fragment)],
            root: NodeId(0),
        }
    }

    /// Root fragment of the document.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever allocated, attached or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds only the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.into(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    /// Create a detached fragment node.
    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::Fragment)
    }

    /// Payload of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    /// Coarse type of a node.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.data(id).kind.node_type()
    }

    /// Whether the node is an element.
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.node_type(id) == NodeType::Element
    }

    /// Whether the node is a comment.
    #[must_use]
    pub fn is_comment(&self, id: NodeId) -> bool {
        self.node_type(id) == NodeType::Comment
    }

    /// Tag name of an element, `None` for other nodes.
    #[must_use]
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Attributes of an element in source order (empty for other nodes).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.data(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Value of an attribute.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Whether an element carries an attribute.
    #[must_use]
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let NodeKind::Element { attributes, .. } = &mut self.data_mut(id).kind else {
            return Err(DomError::NotAnElement(id));
        };
        let value = value.into();
        match attributes.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.value = value,
            None => attributes.push(Attribute::new(name, value)),
        }
        Ok(())
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let NodeKind::Element { attributes, .. } = &mut self.data_mut(id).kind else {
            return None;
        };
        let index = attributes.iter().position(|attr| attr.name == name)?;
        Some(attributes.remove(index).value)
    }

    /// Character data of a text or comment node.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Replace the character data of a text or comment node.
    ///
    /// Elements and fragments have their children replaced by a single text node.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        let text = text.into();
        if let NodeKind::Text(data) | NodeKind::Comment(data) = &mut self.data_mut(id).kind {
            *data = text;
            return;
        }
        for child in self.data(id).children.clone() {
            self.detach(child);
        }
        let node = self.create_text(text);
        self.link(id, node, None);
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.data(id).kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            NodeKind::Element { .. } | NodeKind::Fragment => {
                for &child in &self.data(id).children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// Children of a node in order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    /// Element children of a node in order.
    #[must_use]
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    /// Sibling following a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|&n| n == id)?;
        siblings.get(index + 1).copied()
    }

    /// Ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&n| self.parent(n))
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|n| n == ancestor)
    }

    /// Whether the node is reachable from the document root.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// Detach a node from its parent. Detached nodes keep their children.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.data_mut(id).parent.take() {
            self.data_mut(parent).children.retain(|&n| n != id);
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        self.data_mut(child).parent = Some(parent);
        let children = &mut self.data_mut(parent).children;
        match index {
            Some(index) => children.insert(index, child),
            None => children.push(child),
        }
    }

    fn check_hierarchy(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_hierarchy(parent, child)?;
        self.detach(child);
        self.link(parent, child, None);
        Ok(())
    }

    /// Insert `child` before `reference` under `parent` (append when `None`).
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check_hierarchy(parent, child)?;
        if reference == Some(child) {
            return Ok(());
        }
        self.detach(child);
        let index = match reference {
            Some(reference) => Some(
                self.children(parent)
                    .iter()
                    .position(|&n| n == reference)
                    .ok_or(DomError::NotAChild { parent, reference })?,
            ),
            None => None,
        };
        self.link(parent, child, index);
        Ok(())
    }

    /// Insert `child` right after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> Result<(), DomError> {
        if reference == child {
            return Ok(());
        }
        let parent = self.parent(reference).ok_or(DomError::Detached(reference))?;
        self.check_hierarchy(parent, child)?;
        self.detach(child);
        let index = self
            .children(parent)
            .iter()
            .position(|&n| n == reference)
            .ok_or(DomError::NotAChild { parent, reference })?;
        self.link(parent, child, Some(index + 1));
        Ok(())
    }

    /// Put `replacement` at the position of `old`, detaching `old`.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) -> Result<(), DomError> {
        if old == replacement {
            return Ok(());
        }
        let parent = self.parent(old).ok_or(DomError::Detached(old))?;
        self.check_hierarchy(parent, replacement)?;
        self.detach(replacement);
        let index = self
            .children(parent)
            .iter()
            .position(|&n| n == old)
            .ok_or(DomError::NotAChild {
                parent,
                reference: old,
            })?;
        self.nodes[parent.0].children[index] = replacement;
        self.data_mut(replacement).parent = Some(parent);
        self.data_mut(old).parent = None;
        Ok(())
    }

    /// Clone a node. The clone is detached; `deep` also clones descendants.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let copy = self.alloc(self.data(id).kind.clone());
        if deep {
            for child in self.data(id).children.clone() {
                let child_copy = self.clone_node(child, true);
                self.link(copy, child_copy, None);
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div");
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(root, div).unwrap();
        doc.append_child(div, a).unwrap();
        doc.append_child(div, b).unwrap();
        (doc, div, a, b)
    }

    #[test]
    fn test_append_and_children() {
        let (doc, div, a, b) = sample();
        assert_eq!(doc.children(div), &[a, b]);
        assert_eq!(doc.parent(a), Some(div));
        assert!(doc.is_connected(b));
    }

    #[test]
    fn test_append_moves_node() {
        let (mut doc, div, a, b) = sample();
        doc.append_child(b, a).unwrap();
        assert_eq!(doc.children(div), &[b]);
        assert_eq!(doc.children(b), &[a]);
    }

    #[test]
    fn test_append_into_descendant_rejected() {
        let (mut doc, div, a, _) = sample();
        let err = doc.append_child(a, div).unwrap_err();
        assert!(matches!(err, DomError::HierarchyRequest { .. }));
    }

    #[test]
    fn test_replace_keeps_position() {
        let (mut doc, div, a, b) = sample();
        let comment = doc.create_comment("marker");
        doc.replace(a, comment).unwrap();
        assert_eq!(doc.children(div), &[comment, b]);
        assert_eq!(doc.parent(a), None);
        assert_eq!(doc.parent(comment), Some(div));

        doc.replace(comment, a).unwrap();
        assert_eq!(doc.children(div), &[a, b]);
    }

    #[test]
    fn test_replace_detached_fails() {
        let mut doc = Document::new();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        assert!(matches!(doc.replace(a, b), Err(DomError::Detached(_))));
    }

    #[test]
    fn test_insert_after_and_before() {
        let (mut doc, div, a, b) = sample();
        let c = doc.create_element("c");
        doc.insert_after(a, c).unwrap();
        assert_eq!(doc.children(div), &[a, c, b]);

        let d = doc.create_element("d");
        doc.insert_before(div, d, Some(a)).unwrap();
        assert_eq!(doc.children(div), &[d, a, c, b]);

        // Moving an attached node after its own predecessor
        doc.insert_after(d, b).unwrap();
        assert_eq!(doc.children(div), &[d, b, a, c]);
    }

    #[test]
    fn test_attributes() {
        let (mut doc, div, _, _) = sample();
        doc.set_attribute(div, "id", "main").unwrap();
        doc.set_attribute(div, "class", "x").unwrap();
        doc.set_attribute(div, "id", "other").unwrap();
        assert_eq!(doc.attribute(div, "id"), Some("other"));
        assert_eq!(doc.attributes(div)[0].name, "id");
        assert_eq!(doc.remove_attribute(div, "id"), Some("other".to_owned()));
        assert!(!doc.has_attribute(div, "id"));
    }

    #[test]
    fn test_set_attribute_on_text_fails() {
        let mut doc = Document::new();
        let text = doc.create_text("hi");
        assert!(matches!(
            doc.set_attribute(text, "x", "y"),
            Err(DomError::NotAnElement(_))
        ));
    }

    #[test]
    fn test_clone_deep() {
        let (mut doc, div, a, _) = sample();
        doc.set_attribute(a, "href", "/").unwrap();
        let copy = doc.clone_node(div, true);
        assert_ne!(copy, div);
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.children(copy).len(), 2);
        let a_copy = doc.children(copy)[0];
        assert_ne!(a_copy, a);
        assert_eq!(doc.attribute(a_copy, "href"), Some("/"));

        let shallow = doc.clone_node(div, false);
        assert!(doc.children(shallow).is_empty());
    }

    #[test]
    fn test_text_content_and_set_text() {
        let (mut doc, div, a, _) = sample();
        let t = doc.create_text("hello");
        doc.append_child(a, t).unwrap();
        assert_eq!(doc.text_content(div), "hello");
        doc.set_text(div, "replaced");
        assert_eq!(doc.text_content(div), "replaced");
        assert_eq!(doc.children(div).len(), 1);
    }

    #[test]
    fn test_next_sibling_and_contains() {
        let (doc, div, a, b) = sample();
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.next_sibling(b), None);
        assert!(doc.contains(div, b));
        assert!(!doc.contains(a, b));
    }
}
