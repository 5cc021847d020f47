//! Directive contract and loading.
//!
//! A directive is a behavior unit bound to an attribute pattern and run at a
//! [`Phase`]. For every visited node the renderer calls `setup` on all loaded
//! directives, `execute` on the eligible ones, and `cleanup` on all of them
//! again once the subtree is done.

mod name;

use std::rc::Rc;

use async_trait::async_trait;
use weft_dom::NodeId;

pub use name::DirectiveName;

use crate::{
    Context, DirectiveError, ParsedAttribute, Pass, Phase, RenderError, Renderer, State, Typings,
};

/// Arguments of [`Directive::setup`].
pub struct SetupArgs<'a> {
    pub renderer: &'a Renderer,
    pub node: NodeId,
    pub context: &'a Context,
    pub state: &'a State,
    /// Whether directives should apply to nodes that did not opt in.
    pub implicit: bool,
}

/// Arguments of [`Directive::execute`].
pub struct ExecuteArgs<'a> {
    pub renderer: &'a Renderer,
    /// Working node: the element, or the placeholder standing for it.
    pub node: NodeId,
    /// Element the attributes belong to.
    pub element: NodeId,
    /// Attributes of `element` matching this directive, in document order.
    pub attributes: Vec<ParsedAttribute>,
    pub context: &'a Context,
    pub state: &'a State,
    /// The render pass, for rendering generated nodes in place.
    pub pass: &'a Pass,
}

/// Arguments of [`Directive::cleanup`].
pub struct CleanupArgs<'a> {
    pub renderer: &'a Renderer,
    pub node: NodeId,
    pub context: &'a Context,
    pub state: &'a State,
}

/// Outcome of [`Directive::setup`].
#[derive(Debug, Default)]
pub enum Setup {
    #[default]
    Continue,
    /// Skip the execute pass and the children of this node.
    Abort,
    /// Merge `state` into the pass state; `execute` overrides eligibility.
    Patch {
        state: State,
        execute: Option<bool>,
    },
}

impl Setup {
    /// Force (or forbid) `execute` regardless of attributes.
    #[must_use]
    pub fn eligible(execute: bool) -> Self {
        Self::Patch {
            state: State::new(),
            execute: Some(execute),
        }
    }

    #[must_use]
    pub fn state(state: State) -> Self {
        Self::Patch {
            state,
            execute: None,
        }
    }
}

/// Outcome of [`Directive::execute`].
#[derive(Debug, Default)]
pub struct Execution {
    /// New working node, when the element was replaced.
    pub element: Option<NodeId>,
    /// Context for later directives and the children.
    pub context: Option<Context>,
    /// Patch merged into the pass state.
    pub state: Option<State>,
    /// End the execute pass for this node. Children and cleanup still run.
    pub stop: bool,
}

impl Execution {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue with `node` as the working node.
    #[must_use]
    pub fn replace(node: NodeId) -> Self {
        Self {
            element: Some(node),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn stop(mut self) -> Self {
        self.stop = true;
        self
    }
}

/// A pluggable behavior unit.
///
/// Only `name` and `phase` are required; every hook defaults to a no-op.
#[async_trait(?Send)]
pub trait Directive {
    fn name(&self) -> DirectiveName;

    fn phase(&self) -> Phase;

    /// Whether several matching attributes on one element are expected.
    fn multiple(&self) -> bool {
        false
    }

    /// Typed modifier schema.
    fn typings(&self) -> Option<Typings> {
        None
    }

    /// Value used when a matching attribute is empty.
    fn default_value(&self) -> Option<String> {
        None
    }

    /// Called once when the directive is loaded.
    async fn init(&self, _renderer: &Renderer) -> Result<(), DirectiveError> {
        Ok(())
    }

    async fn setup(&self, _args: SetupArgs<'_>) -> Result<Setup, DirectiveError> {
        Ok(Setup::Continue)
    }

    async fn execute(&self, _args: ExecuteArgs<'_>) -> Result<Execution, DirectiveError> {
        Ok(Execution::new())
    }

    async fn cleanup(&self, _args: CleanupArgs<'_>) -> Result<(), DirectiveError> {
        Ok(())
    }
}

/// A directive with its metadata read once at load.
#[derive(Clone)]
pub(crate) struct LoadedDirective {
    pub(crate) directive: Rc<dyn Directive>,
    pub(crate) name: DirectiveName,
    pub(crate) identity: String,
    pub(crate) phase: Phase,
    pub(crate) multiple: bool,
    pub(crate) typings: Option<Typings>,
    pub(crate) default_value: Option<String>,
}

impl LoadedDirective {
    fn new(directive: Rc<dyn Directive>) -> Result<Self, RenderError> {
        let name = directive.name();
        if name.is_empty() {
            return Err(RenderError::InvalidDirective(
                "directive name is empty".to_owned(),
            ));
        }
        let identity = name.identity();
        let phase = directive.phase();
        if !phase.is_valid() {
            return Err(RenderError::InvalidDirective(format!(
                "{identity} has invalid phase {}",
                phase.value()
            )));
        }
        Ok(Self {
            name,
            identity,
            phase,
            multiple: directive.multiple(),
            typings: directive.typings(),
            default_value: directive.default_value(),
            directive,
        })
    }
}

impl Renderer {
    /// Load directives.
    ///
    /// Every directive is validated before any is loaded. Directives whose
    /// identity is already loaded are skipped with a warning, and
    /// [`Phase::META`] directives are dropped. The remaining ones are
    /// initialized in order, then the full list is re-sorted by phase, keeping
    /// registration order within a phase.
    ///
    /// When an `init` hook fails, the directives initialized before it stay
    /// loaded and the rest of the batch is not. Loading the same batch again
    /// skips the ones already in, so no `init` runs twice.
    ///
    /// Returns the number of directives added.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidDirective`] for an empty name or a negative phase,
    /// [`RenderError::Init`] when an `init` hook fails.
    pub async fn load<I>(&self, directives: I) -> Result<usize, RenderError>
    where
        I: IntoIterator<Item = Rc<dyn Directive>>,
    {
        let candidates = directives
            .into_iter()
            .map(LoadedDirective::new)
            .collect::<Result<Vec<_>, _>>()?;

        let mut loaded = self.inner.directives.borrow().to_vec();
        let mut added = 0;
        let mut failure = None;
        for candidate in candidates {
            if loaded.iter().any(|d| d.identity == candidate.identity) {
                self.warn(
                    None,
                    Some(candidate.identity.as_str()),
                    "directive is already loaded, skipping",
                );
                continue;
            }
            if !candidate.phase.is_executable() {
                tracing::debug!(directive = %candidate.identity, "Dropping metadata-only directive");
                continue;
            }
            if let Err(source) = candidate.directive.init(self).await {
                failure = Some(RenderError::Init {
                    directive: candidate.identity,
                    source,
                });
                break;
            }
            tracing::debug!(
                directive = %candidate.identity,
                phase = %candidate.phase,
                "Loaded directive"
            );
            loaded.push(candidate);
            added += 1;
        }

        loaded.sort_by_key(|d| d.phase);
        *self.inner.directives.borrow_mut() = loaded.into();
        failure.map_or(Ok(added), Err)
    }

    /// Identities of the loaded directives in execution order.
    #[must_use]
    pub fn directives(&self) -> Vec<String> {
        self.inner
            .directives
            .borrow()
            .iter()
            .map(|d| d.identity.clone())
            .collect()
    }

    pub(crate) fn loaded(&self) -> Rc<[LoadedDirective]> {
        Rc::clone(&self.inner.directives.borrow())
    }
}
