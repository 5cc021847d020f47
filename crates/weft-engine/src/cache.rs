//! Per-directive node caches.
//!
//! Each renderer owns one named store per directive, keyed by [`NodeId`].
//! Document nodes are never freed, so entries are dropped explicitly through
//! [`Renderer::forget`] when a subtree leaves the document for good.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use weft_dom::{NodeFilter, NodeId};

use crate::{CacheError, Renderer};

/// Name reserved for the morph identity map.
pub const IDENTITY_CACHE: &str = "*";

/// Node-keyed store shared by every handle obtained for the same name.
pub struct NodeCache<T>(Rc<RefCell<HashMap<NodeId, T>>>);

impl<T> Clone for NodeCache<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for NodeCache<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(HashMap::new())))
    }
}

impl<T: Clone> NodeCache<T> {
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<T> {
        self.0.borrow().get(&node).cloned()
    }
}

impl<T> NodeCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the previous one.
    pub fn insert(&self, node: NodeId, value: T) -> Option<T> {
        self.0.borrow_mut().insert(node, value)
    }

    pub fn remove(&self, node: NodeId) -> Option<T> {
        self.0.borrow_mut().remove(&node)
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.0.borrow().contains_key(&node)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Type-erased view used by the registry.
trait ErasedCache {
    fn forget(&self, node: NodeId);
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> ErasedCache for NodeCache<T> {
    fn forget(&self, node: NodeId) {
        self.remove(node);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Named caches of one renderer.
#[derive(Default)]
pub(crate) struct Caches {
    stores: RefCell<HashMap<String, Box<dyn ErasedCache>>>,
}

impl Caches {
    pub(crate) fn forget(&self, node: NodeId) {
        for store in self.stores.borrow().values() {
            store.forget(node);
        }
    }
}

fn check_name(name: &str) -> Result<(), CacheError> {
    if name == IDENTITY_CACHE {
        return Err(CacheError::Reserved(name.to_owned()));
    }
    Ok(())
}

impl Renderer {
    /// Cache registered under `name`, created on first use.
    ///
    /// # Errors
    ///
    /// [`CacheError::Reserved`] for the identity map name and
    /// [`CacheError::TypeMismatch`] when `name` already holds another type.
    pub fn cache<T: 'static>(&self, name: &str) -> Result<NodeCache<T>, CacheError> {
        check_name(name)?;
        let mut stores = self.inner.caches.stores.borrow_mut();
        if let Some(store) = stores.get(name) {
            return store
                .as_any()
                .downcast_ref::<NodeCache<T>>()
                .cloned()
                .ok_or_else(|| CacheError::TypeMismatch(name.to_owned()));
        }
        let cache = NodeCache::new();
        stores.insert(name.to_owned(), Box::new(cache.clone()));
        Ok(cache)
    }

    /// Install `cache` under `name`, replacing any existing store.
    pub fn set_cache<T: 'static>(&self, name: &str, cache: NodeCache<T>) -> Result<(), CacheError> {
        check_name(name)?;
        self.inner
            .caches
            .stores
            .borrow_mut()
            .insert(name.to_owned(), Box::new(cache));
        Ok(())
    }

    /// Nodes below `node` (inclusive), following placeholders into the
    /// detached originals they stand for.
    pub(crate) fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let document = self.document();
        let morph = self.inner.morph.borrow();
        let mut nodes = Vec::new();
        let mut roots = vec![node];
        while let Some(root) = roots.pop() {
            for id in std::iter::once(root).chain(document.walk(root, NodeFilter::ALL)) {
                if let Some(original) = morph.original(id) {
                    roots.push(original);
                }
                nodes.push(id);
            }
        }
        nodes
    }

    /// Drop every record the renderer holds for `node` and its subtree:
    /// caches, attribute syntax, morph mappings, watches and queued renders.
    pub fn forget(&self, node: NodeId) {
        let nodes = self.subtree(node);
        tracing::trace!(node = %node, count = nodes.len(), "Forgetting subtree");
        for &id in &nodes {
            self.inner.caches.forget(id);
            self.inner.syntax.forget(id);
            self.inner.morph.borrow_mut().forget(id);
            self.unwatch(id);
        }
    }

    /// Detach `node` permanently and forget its subtree.
    pub fn remove(&self, node: NodeId) {
        self.document_mut().detach(node);
        self.forget(node);
    }
}
