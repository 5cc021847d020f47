//! The render traversal.
//!
//! Per node: gate, `setup` pass, `execute` pass in phase order, recursion into
//! the children of the (possibly replaced) node, `cleanup` pass. Hook failures
//! are recovered at the node that raised them and collected on the [`Pass`].

mod options;
mod warning;


use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use weft_dom::{Document, NodeId, NodeType, Selector};

pub use options::{Pass, RenderOptions, Rendered, RendererOptions, WarningSink};
pub(crate) use options::PassFlags;
pub use warning::{WARN_ATTRIBUTE, Warning};

use crate::attribute::{AttributeRef, ParseOptions, ParsedAttribute, SyntaxMemo};
use crate::cache::Caches;
use crate::directive::{CleanupArgs, ExecuteArgs, LoadedDirective, Setup, SetupArgs};
use crate::expression::{Expressions, is_reserved};
use crate::morph::MorphMap;
use crate::reactive::{Reactive, Rerender, Tracker};
use crate::{Context, Hook, RenderError, State};

pub(crate) struct Inner {
    pub(crate) document: Rc<RefCell<Document>>,
    pub(crate) options: RendererOptions,
    pub(crate) directives: RefCell<Rc<[LoadedDirective]>>,
    pub(crate) caches: Caches,
    pub(crate) expressions: Expressions,
    pub(crate) syntax: SyntaxMemo,
    pub(crate) morph: RefCell<MorphMap>,
    pub(crate) reactive: Reactive,
}

/// Rendering engine bound to one document.
///
/// Cloning is cheap and yields a handle to the same engine.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use weft_dom::Document;
/// use weft_engine::{RenderOptions, Rendered, Renderer, RendererOptions};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let mut document = Document::new();
/// let root = document.root();
/// document.append_markup("<p>static</p>").unwrap();
///
/// let renderer = Renderer::new(Rc::new(RefCell::new(document)), RendererOptions::default());
/// let rendered = renderer.render(root, RenderOptions::new().stringify()).await.unwrap();
/// assert_eq!(rendered, Rendered::Html("<p>static</p>".to_owned()));
/// # });
/// ```
#[derive(Clone)]
pub struct Renderer {
    pub(crate) inner: Rc<Inner>,
}

impl Renderer {
    #[must_use]
    pub fn new(document: Rc<RefCell<Document>>, options: RendererOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                document,
                options,
                directives: RefCell::new(Rc::from(Vec::new())),
                caches: Caches::default(),
                expressions: Expressions::default(),
                syntax: SyntaxMemo::default(),
                morph: RefCell::new(MorphMap::default()),
                reactive: Reactive::default(),
            }),
        }
    }

    /// Shared document handle.
    #[must_use]
    pub fn document_handle(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.inner.document)
    }

    /// Borrow the document.
    ///
    /// # Panics
    ///
    /// Panics while a mutable borrow is alive. Never hold a borrow across an
    /// `.await`.
    pub fn document(&self) -> Ref<'_, Document> {
        self.inner.document.borrow()
    }

    /// Borrow the document mutably. Same rules as [`Renderer::document`].
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.inner.document.borrow_mut()
    }

    #[must_use]
    pub fn options(&self) -> &RendererOptions {
        &self.inner.options
    }

    /// Render the tree at `root`.
    ///
    /// A fragment root renders its children concurrently; any other node
    /// renders itself. Failures of one subtree never stop its siblings.
    ///
    /// # Errors
    ///
    /// [`RenderError::Reserved`] when the context or state uses the reserved
    /// prefix, [`RenderError::Dom`] for an invalid `select`, and in strict
    /// mode [`RenderError::Aggregate`] with every hook failure of the call.
    ///
    /// # Panics
    ///
    /// Reactive renders spawn the re-render scheduler with
    /// [`tokio::task::spawn_local`], so they panic outside a
    /// [`tokio::task::LocalSet`].
    pub async fn render(
        &self,
        root: NodeId,
        options: RenderOptions,
    ) -> Result<Rendered, RenderError> {
        let context = options.context.unwrap_or_default();
        let state = options.state.unwrap_or_default();
        if let Some(key) = context
            .values()
            .keys()
            .chain(state.keys())
            .find(|key| is_reserved(key))
        {
            return Err(RenderError::Reserved(key.clone()));
        }

        let defaults = &self.inner.options;
        let flags = PassFlags {
            implicit: options.implicit.unwrap_or(defaults.implicit),
            reactive: options.reactive.unwrap_or(defaults.reactive),
            strict: options.strict.unwrap_or(defaults.strict),
        };

        let root = match &options.select {
            Some(source) => {
                let selector = Selector::parse(source)?;
                let found = self.document().query_selector(root, &selector);
                match found {
                    Some(node) => node,
                    None => {
                        tracing::debug!(selector = %source, "Selector matched nothing");
                        return Ok(if options.stringify {
                            Rendered::Html(String::new())
                        } else {
                            Rendered::Node(None)
                        });
                    }
                }
            }
            None => root,
        };

        tracing::debug!(
            root = %root,
            reactive = flags.reactive,
            strict = flags.strict,
            "Rendering"
        );
        if flags.reactive {
            self.ensure_scheduler();
        }

        let pass = Pass::new(flags);
        let is_fragment = self.document().node_type(root) == NodeType::Fragment;
        let rendered = if is_fragment {
            let children = self.renderable_children(root);
            join_all(
                children
                    .into_iter()
                    .map(|child| self.render_subtree(child, &context, &state, &pass)),
            )
            .await;
            root
        } else {
            self.render_subtree(root, &context, &state, &pass).await
        };

        let failures = pass.into_failures();
        if flags.strict && !failures.is_empty() {
            return Err(RenderError::Aggregate(failures));
        }
        if options.stringify {
            return Ok(Rendered::Html(self.document().outer_html(rendered)));
        }
        Ok(Rendered::Node(Some(rendered)))
    }

    /// Render `node` and its subtree as part of `pass`.
    ///
    /// Expansion directives use this to render the instances they generate.
    /// Returns the working node after morphing.
    pub fn render_subtree<'a>(
        &'a self,
        node: NodeId,
        context: &'a Context,
        state: &'a State,
        pass: &'a Pass,
    ) -> LocalBoxFuture<'a, NodeId> {
        self.traverse(node, context.clone(), state.clone(), pass)
            .boxed_local()
    }

    /// Children to recurse into: expansion instances are rendered by the
    /// directive that generated them.
    fn renderable_children(&self, node: NodeId) -> Vec<NodeId> {
        let children = self.document().children(node).to_vec();
        children
            .into_iter()
            .filter(|&child| !self.is_instance(child))
            .collect()
    }

    fn is_processable(&self, node: NodeId) -> bool {
        let node_type = self.document().node_type(node);
        match node_type {
            NodeType::Element => true,
            NodeType::Comment => self.is_placeholder(node),
            NodeType::Text | NodeType::Fragment => false,
        }
    }

    /// Attributes of `element` matching `directive`, parsed.
    fn matching_attributes(
        &self,
        element: NodeId,
        directive: &LoadedDirective,
    ) -> Vec<ParsedAttribute> {
        let names: Vec<String> = self
            .document()
            .attributes(element)
            .iter()
            .filter(|attribute| directive.name.matches(&attribute.name))
            .map(|attribute| attribute.name.clone())
            .collect();
        let options = ParseOptions {
            prefix: directive.name.prefix(),
            typings: directive.typings.as_ref(),
            default_value: directive.default_value.as_deref(),
            directive: Some(directive.identity.as_str()),
        };
        names
            .into_iter()
            .filter_map(|name| {
                self.parse_attribute(
                    &AttributeRef {
                        node: element,
                        name,
                    },
                    options,
                )
            })
            .collect()
    }

    async fn traverse(
        &self,
        node: NodeId,
        mut context: Context,
        mut state: State,
        pass: &Pass,
    ) -> NodeId {
        if !self.is_processable(node) {
            return node;
        }
        tracing::trace!(node = %node, "Visiting node");

        let directives = self.loaded();
        let entry = pass.flags.reactive.then(|| Rerender {
            context: context.clone(),
            state: state.clone(),
            flags: pass.flags,
        });
        let mut tracker = pass.flags.reactive.then(|| Tracker::start(&context));
        let mut working = node;

        // Setup pass
        let mut aborted = false;
        let mut overrides: HashMap<usize, bool> = HashMap::new();
        for (index, directive) in directives.iter().enumerate() {
            let args = SetupArgs {
                renderer: self,
                node: working,
                context: &context,
                state: &state,
                implicit: pass.flags.implicit,
            };
            match directive.directive.setup(args).await {
                Ok(Setup::Continue) => {}
                Ok(Setup::Abort) => {
                    tracing::trace!(node = %node, directive = %directive.identity, "Setup aborted node");
                    aborted = true;
                    break;
                }
                Ok(Setup::Patch {
                    state: patch,
                    execute,
                }) => {
                    state.merge(patch);
                    if let Some(execute) = execute {
                        overrides.insert(index, execute);
                    }
                }
                Err(error) => {
                    self.fail(pass, working, directive, Hook::Setup, error);
                    aborted = true;
                    break;
                }
            }
        }

        // Execute pass
        if !aborted {
            let mut claimed = HashSet::new();
            for (index, directive) in directives.iter().enumerate() {
                let element = self.resolve(working);
                let attributes = self.matching_attributes(element, directive);
                let eligible = overrides
                    .get(&index)
                    .copied()
                    .unwrap_or(!attributes.is_empty());
                if !eligible {
                    continue;
                }
                if !claimed.insert(directive.phase) {
                    self.warn(
                        Some(working),
                        Some(directive.identity.as_str()),
                        format!(
                            "phase {} is shared with another directive on this node",
                            directive.phase
                        ),
                    );
                }
                if !directive.multiple && attributes.len() > 1 {
                    self.warn(
                        Some(working),
                        Some(directive.identity.as_str()),
                        format!(
                            "{} matching attributes but the directive expects one",
                            attributes.len()
                        ),
                    );
                }

                let args = ExecuteArgs {
                    renderer: self,
                    node: working,
                    element,
                    attributes,
                    context: &context,
                    state: &state,
                    pass,
                };
                match directive.directive.execute(args).await {
                    Ok(execution) => {
                        if let Some(next) = execution.element {
                            working = next;
                        }
                        if let Some(next) = execution.context {
                            context = next;
                            if let Some(tracker) = tracker.as_mut() {
                                tracker.repoint(&context);
                            }
                        }
                        if let Some(patch) = execution.state {
                            state.merge(patch);
                        }
                        if execution.stop {
                            break;
                        }
                    }
                    Err(error) => {
                        self.fail(pass, working, directive, Hook::Execute, error);
                        aborted = true;
                        break;
                    }
                }
            }
        }

        if let (Some(tracker), Some(entry)) = (tracker.take(), entry) {
            if working != node {
                self.unwatch(node);
            }
            self.watch(working, entry, tracker.finish());
        }

        if !aborted {
            for child in self.renderable_children(working) {
                // Skip children an earlier sibling moved or removed
                if self.document().parent(child) != Some(working) {
                    continue;
                }
                self.render_subtree(child, &context, &state, pass).await;
            }
        }

        // Cleanup pass
        for directive in directives.iter() {
            let args = CleanupArgs {
                renderer: self,
                node: working,
                context: &context,
                state: &state,
            };
            if let Err(error) = directive.directive.cleanup(args).await {
                self.fail(pass, working, directive, Hook::Cleanup, error);
            }
        }

        working
    }
}
