//! Observable variable scopes.
//!
//! A [`Context`] is a layered scope: [`Context::fork`] creates a child layer
//! that shadows its parent. Every fork family shares one listener hub, and
//! every read and write emits a [`ContextEvent`] carrying the accessed path and
//! the layer that owns it. The reactivity subsystem builds dependency tracking
//! on top of these events.
//!
//! [`State`] is the non-observable counterpart, a per-render bag that
//! directives merge patches into.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

use crate::ExpressionError;
use crate::value::{member, type_name};

/// Function exposed to expressions.
pub type Callable = Rc<dyn Fn(&[Value]) -> Result<Value, ExpressionError>>;

/// Identity of one context layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Ids are unique across fork families.
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Registration handle returned by [`Context::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Whether an event is a read or a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Observed access to a context path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextEvent {
    pub kind: AccessKind,
    /// Dotted path, e.g. `user.name` or `items.0`.
    pub path: String,
    /// Layer owning the root variable (the accessed layer when undefined).
    pub origin: ContextId,
}

type Listener = Rc<dyn Fn(&ContextEvent)>;

/// Listener registry shared by a fork family.
#[derive(Default)]
struct Hub {
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

impl Hub {
    fn emit(&self, event: &ContextEvent) {
        // Listeners may (un)subscribe while being notified
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

struct Layer {
    id: ContextId,
    parent: Option<Context>,
    values: RefCell<Map<String, Value>>,
    callables: RefCell<HashMap<String, Callable>>,
    hub: Rc<Hub>,
}

/// Forkable, observable variable scope.
///
/// Cloning a `Context` clones the handle, not the variables.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use weft_engine::Context;
///
/// let root = Context::from_values(json!({"user": {"name": "ada"}, "count": 1}));
/// let child = root.fork(json!({"count": 2}));
///
/// assert_eq!(child.get("count"), Some(json!(2)));
/// assert_eq!(child.get("user.name"), Some(json!("ada")));
///
/// // Writes to a name owned by an ancestor land in the ancestor
/// child.set("user.name", json!("grace")).unwrap();
/// assert_eq!(root.get("user.name"), Some(json!("grace")));
/// ```
#[derive(Clone)]
pub struct Context(Rc<Layer>);

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.0.id)
            .field("values", &self.values())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create an empty root context.
    #[must_use]
    pub fn new() -> Self {
        Self::with_values(Map::new())
    }

    /// Create a root context from a JSON object. Non-objects give an empty
    /// context.
    #[must_use]
    pub fn from_values(values: Value) -> Self {
        match values {
            Value::Object(map) => Self::with_values(map),
            _ => Self::new(),
        }
    }

    /// Create a root context from the `[context]` table of a configuration.
    pub fn from_config(config: &weft_config::Config) -> Result<Self, serde_json::Error> {
        Ok(Self::from_values(serde_json::to_value(&config.context)?))
    }

    fn with_values(values: Map<String, Value>) -> Self {
        Self(Rc::new(Layer {
            id: ContextId::next(),
            parent: None,
            values: RefCell::new(values),
            callables: RefCell::new(HashMap::new()),
            hub: Rc::new(Hub::default()),
        }))
    }

    /// Create a child layer shadowing this one with the entries of `patch`.
    #[must_use]
    pub fn fork(&self, patch: Value) -> Self {
        let values = match patch {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self(Rc::new(Layer {
            id: ContextId::next(),
            parent: Some(self.clone()),
            values: RefCell::new(values),
            callables: RefCell::new(HashMap::new()),
            hub: Rc::clone(&self.0.hub),
        }))
    }

    /// Identity of this layer.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.0.id
    }

    /// Parent layer, if forked.
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.0.parent.as_ref()
    }

    /// Whether two handles point to the same layer.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether both contexts belong to the same fork family.
    #[must_use]
    pub fn same_family(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0.hub, &other.0.hub)
    }

    /// This layer and its ancestors, nearest first.
    pub fn layers(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |&ctx| ctx.parent())
    }

    /// Ids of this layer and its ancestors.
    #[must_use]
    pub fn lineage(&self) -> Vec<ContextId> {
        self.layers().map(Self::id).collect()
    }

    fn owner(&self, name: &str) -> Option<&Self> {
        self.layers()
            .find(|ctx| ctx.0.values.borrow().contains_key(name))
    }

    /// Read a dotted path.
    ///
    /// Returns `None` when the root variable is undefined in every layer.
    /// Missing members below an existing root read as `null`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let owner = self.owner(root);
        let value = owner.and_then(|ctx| ctx.0.values.borrow().get(root).cloned());
        self.emit(AccessKind::Read, path, owner.map_or(self.id(), Self::id));
        let mut value = value?;
        for segment in segments {
            value = member(&value, segment);
        }
        Some(value)
    }

    /// Write a dotted path, creating intermediate objects as needed.
    ///
    /// The write lands in the layer owning the root variable, or in this layer
    /// when no layer defines it.
    pub fn set(&self, path: &str, value: Value) -> Result<(), ExpressionError> {
        let segments: Vec<&str> = path.split('.').collect();
        let (root, rest) = segments
            .split_first()
            .ok_or_else(|| ExpressionError::Type("empty assignment path".to_owned()))?;
        let owner = self.owner(root).unwrap_or(self);
        {
            let mut values = owner.0.values.borrow_mut();
            match rest.split_last() {
                None => {
                    values.insert((*root).to_owned(), value);
                }
                Some((last, middle)) => {
                    let mut target = values
                        .entry((*root).to_owned())
                        .or_insert_with(|| Value::Object(Map::new()));
                    for segment in middle {
                        target = child_mut(target, segment)?;
                    }
                    assign(target, last, value)?;
                }
            }
        }
        self.emit(AccessKind::Write, path, owner.id());
        Ok(())
    }

    /// Expose a function to expressions under `name` in this layer.
    pub fn define<F>(&self, name: impl Into<String>, callable: F)
    where
        F: Fn(&[Value]) -> Result<Value, ExpressionError> + 'static,
    {
        self.0
            .callables
            .borrow_mut()
            .insert(name.into(), Rc::new(callable));
    }

    /// Function defined under `name` in this layer or an ancestor.
    #[must_use]
    pub fn callable(&self, name: &str) -> Option<Callable> {
        self.layers()
            .find_map(|ctx| ctx.0.callables.borrow().get(name).map(Rc::clone))
    }

    /// Whether a variable named `name` is defined in any layer. Emits nothing.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.owner(name).is_some()
    }

    /// Merged view of all layers, nearest layer winning. Emits nothing.
    #[must_use]
    pub fn values(&self) -> Map<String, Value> {
        let layers: Vec<&Self> = self.layers().collect();
        let mut merged = Map::new();
        for ctx in layers.into_iter().rev() {
            for (key, value) in ctx.0.values.borrow().iter() {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Register a listener for every read and write in the fork family.
    pub fn subscribe(&self, listener: impl Fn(&ContextEvent) + 'static) -> ListenerId {
        let hub = &self.0.hub;
        let id = ListenerId(hub.next_listener.get());
        hub.next_listener.set(id.0 + 1);
        hub.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener registered on this fork family.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.0
            .hub
            .listeners
            .borrow_mut()
            .retain(|(listener, _)| *listener != id);
    }

    fn emit(&self, kind: AccessKind, path: &str, origin: ContextId) {
        self.0.hub.emit(&ContextEvent {
            kind,
            path: path.to_owned(),
            origin,
        });
    }
}

fn child_mut<'a>(target: &'a mut Value, key: &str) -> Result<&'a mut Value, ExpressionError> {
    match target {
        Value::Object(map) => Ok(map
            .entry(key.to_owned())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get_mut(index))
            .ok_or_else(|| ExpressionError::Type(format!("array has no index {key}"))),
        other => Err(ExpressionError::Type(format!(
            "cannot read property {key} of {}",
            type_name(other)
        ))),
    }
}

fn assign(target: &mut Value, key: &str, value: Value) -> Result<(), ExpressionError> {
    match target {
        Value::Object(map) => {
            map.insert(key.to_owned(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index: usize = key
                .parse()
                .map_err(|_| ExpressionError::Type(format!("invalid array index {key}")))?;
            match index.cmp(&items.len()) {
                std::cmp::Ordering::Less => items[index] = value,
                std::cmp::Ordering::Equal => items.push(value),
                std::cmp::Ordering::Greater => {
                    return Err(ExpressionError::Type(format!(
                        "array index {index} out of bounds"
                    )));
                }
            }
            Ok(())
        }
        other => Err(ExpressionError::Type(format!(
            "cannot set property {key} of {}",
            type_name(other)
        ))),
    }
}

/// Ephemeral per-pass key/value bag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State(Map<String, Value>);

impl State {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Merge a patch, overwriting existing keys.
    pub fn merge(&mut self, patch: Self) {
        self.0.extend(patch.0);
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for State {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(context: &Context) -> Rc<RefCell<Vec<ContextEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        context.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn test_fork_shadows_parent() {
        let root = Context::from_values(json!({"a": 1, "b": 2}));
        let child = root.fork(json!({"a": 10}));
        assert_eq!(child.get("a"), Some(json!(10)));
        assert_eq!(child.get("b"), Some(json!(2)));
        assert_eq!(root.get("a"), Some(json!(1)));
        assert_eq!(child.get("c"), None);
        assert_eq!(child.values(), json!({"a": 10, "b": 2}).as_object().cloned().unwrap());
    }

    #[test]
    fn test_set_goes_to_owner() {
        let root = Context::from_values(json!({"count": 0}));
        let child = root.fork(json!({}));
        child.set("count", json!(1)).unwrap();
        child.set("fresh", json!(true)).unwrap();
        assert_eq!(root.get("count"), Some(json!(1)));
        assert_eq!(root.get("fresh"), None);
        assert_eq!(child.get("fresh"), Some(json!(true)));
    }

    #[test]
    fn test_set_nested_paths() {
        let ctx = Context::from_values(json!({"items": [1, 2]}));
        ctx.set("user.name", json!("ada")).unwrap();
        ctx.set("items.1", json!(5)).unwrap();
        ctx.set("items.2", json!(6)).unwrap();
        assert_eq!(ctx.get("user"), Some(json!({"name": "ada"})));
        assert_eq!(ctx.get("items"), Some(json!([1, 5, 6])));
        assert_eq!(ctx.get("items.length"), Some(json!(3)));

        let err = ctx.set("items.9", json!(0)).unwrap_err();
        assert!(matches!(err, ExpressionError::Type(_)));
        ctx.set("flag", json!(true)).unwrap();
        assert!(ctx.set("flag.inner", json!(1)).is_err());
    }

    #[test]
    fn test_events_carry_owner() {
        let root = Context::from_values(json!({"count": 0}));
        let child = root.fork(json!({"local": 1}));
        let events = record(&root);

        child.get("count");
        child.get("local");
        child.set("count", json!(1)).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                ContextEvent {
                    kind: AccessKind::Read,
                    path: "count".to_owned(),
                    origin: root.id()
                },
                ContextEvent {
                    kind: AccessKind::Read,
                    path: "local".to_owned(),
                    origin: child.id()
                },
                ContextEvent {
                    kind: AccessKind::Write,
                    path: "count".to_owned(),
                    origin: root.id()
                },
            ]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let ctx = Context::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = ctx.subscribe(move |_| counter.set(counter.get() + 1));
        ctx.get("x");
        ctx.unsubscribe(id);
        ctx.get("x");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_separate_roots_do_not_share_listeners() {
        let a = Context::new();
        let b = Context::new();
        let events = record(&a);
        b.set("x", json!(1)).unwrap();
        assert!(events.borrow().is_empty());
        assert!(!a.same_family(&b));
        assert!(a.same_family(&a.fork(json!({}))));
    }

    #[test]
    fn test_ids_are_unique_across_families() {
        let a = Context::new();
        let b = Context::new();
        let a_child = a.fork(json!({}));
        let b_child = b.fork(json!({}));
        assert_ne!(a.id(), b.id());
        assert_ne!(a_child.id(), b_child.id());
        assert!(!b_child.lineage().contains(&a.id()));
        assert!(!b_child.lineage().contains(&a_child.id()));
    }

    #[test]
    fn test_callables() {
        let root = Context::new();
        root.define("double", |args| {
            Ok(json!(args.first().and_then(Value::as_i64).unwrap_or(0) * 2))
        });
        let child = root.fork(json!({}));
        let double = child.callable("double").unwrap();
        assert_eq!(double(&[json!(21)]).unwrap(), json!(42));
        assert!(child.callable("missing").is_none());
    }

    #[test]
    fn test_lineage() {
        let root = Context::new();
        let child = root.fork(json!({}));
        let grandchild = child.fork(json!({}));
        assert_eq!(grandchild.lineage(), vec![grandchild.id(), child.id(), root.id()]);
    }

    #[test]
    fn test_state_merge() {
        let mut state = State::new().with("a", json!(1)).with("b", json!(2));
        state.merge(State::new().with("b", json!(3)).with("c", json!(4)));
        assert_eq!(state.get("a"), Some(&json!(1)));
        assert_eq!(state.get("b"), Some(&json!(3)));
        assert_eq!(state.get("c"), Some(&json!(4)));
    }
}
