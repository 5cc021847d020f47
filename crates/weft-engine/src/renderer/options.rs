use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use weft_config::Config;
use weft_dom::NodeId;

use crate::{Context, HookFailure, State, Warning};

/// Receives every warning instead of the default node annotation.
pub type WarningSink = Rc<dyn Fn(&Warning)>;

/// Renderer-wide defaults.
#[derive(Clone)]
pub struct RendererOptions {
    /// Warning sink. Without one, hook failures are annotated on the node.
    pub warnings: Option<WarningSink>,
    /// Annotate failing nodes with a `*warn` attribute when there is no sink.
    pub annotate_warnings: bool,
    /// Turn hook failures into [`RenderError::Aggregate`](crate::RenderError).
    pub strict: bool,
    /// Passed to `setup` hooks as [`SetupArgs::implicit`](crate::SetupArgs).
    pub implicit: bool,
    /// Track reads and re-render on matching writes.
    pub reactive: bool,
    /// Quiet time required before a re-render batch runs.
    pub debounce: Duration,
    /// Extra delay between the end of the debounce and draining.
    pub settle: Duration,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            warnings: None,
            annotate_warnings: true,
            strict: false,
            implicit: true,
            reactive: false,
            debounce: Duration::from_millis(50),
            settle: Duration::from_millis(10),
        }
    }
}

impl fmt::Debug for RendererOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererOptions")
            .field("warnings", &self.warnings.is_some())
            .field("annotate_warnings", &self.annotate_warnings)
            .field("strict", &self.strict)
            .field("implicit", &self.implicit)
            .field("reactive", &self.reactive)
            .field("debounce", &self.debounce)
            .field("settle", &self.settle)
            .finish()
    }
}

impl RendererOptions {
    #[must_use]
    pub fn with_warnings(mut self, sink: impl Fn(&Warning) + 'static) -> Self {
        self.warnings = Some(Rc::new(sink));
        self
    }
}

impl From<&Config> for RendererOptions {
    fn from(config: &Config) -> Self {
        Self {
            warnings: None,
            annotate_warnings: config.renderer.annotate_warnings,
            strict: config.renderer.strict,
            implicit: config.renderer.implicit,
            reactive: config.reactivity.enabled,
            debounce: Duration::from_millis(config.reactivity.debounce_ms),
            settle: Duration::from_millis(config.reactivity.settle_ms),
        }
    }
}

/// Per-call options of [`Renderer::render`](crate::Renderer::render).
///
/// Unset flags fall back to the [`RendererOptions`].
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Root context. A fresh empty context when absent.
    pub context: Option<Context>,
    pub state: Option<State>,
    pub implicit: Option<bool>,
    pub reactive: Option<bool>,
    /// Render the first descendant matching this selector instead of the root.
    pub select: Option<String>,
    /// Return the serialized result instead of the node.
    pub stringify: bool,
    pub strict: Option<bool>,
}

impl RenderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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
    pub fn reactive(mut self, reactive: bool) -> Self {
        self.reactive = Some(reactive);
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    #[must_use]
    pub fn implicit(mut self, implicit: bool) -> Self {
        self.implicit = Some(implicit);
        self
    }

    #[must_use]
    pub fn select(mut self, selector: impl Into<String>) -> Self {
        self.select = Some(selector.into());
        self
    }

    #[must_use]
    pub fn stringify(mut self) -> Self {
        self.stringify = true;
        self
    }
}

/// Result of a render call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rendered {
    /// Working node after morphing, `None` when `select` matched nothing.
    Node(Option<NodeId>),
    Html(String),
}

impl Rendered {
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(node) => *node,
            Self::Html(_) => None,
        }
    }

    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Html(html) => Some(html),
            Self::Node(_) => None,
        }
    }
}

/// Flags resolved for one render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PassFlags {
    pub(crate) implicit: bool,
    pub(crate) reactive: bool,
    pub(crate) strict: bool,
}

/// One render pass: its flags and the hook failures it collected.
#[derive(Debug)]
pub struct Pass {
    pub(crate) flags: PassFlags,
    failures: RefCell<Vec<HookFailure>>,
}

impl Pass {
    pub(crate) fn new(flags: PassFlags) -> Self {
        Self {
            flags,
            failures: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn implicit(&self) -> bool {
        self.flags.implicit
    }

    #[must_use]
    pub fn reactive(&self) -> bool {
        self.flags.reactive
    }

    #[must_use]
    pub fn strict(&self) -> bool {
        self.flags.strict
    }

    /// Number of hook failures so far.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.borrow().len()
    }

    pub(crate) fn record(&self, failure: HookFailure) {
        self.failures.borrow_mut().push(failure);
    }

    pub(crate) fn into_failures(self) -> Vec<HookFailure> {
        self.failures.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_from_config() {
        let config = Config::from_toml(
            r"
[renderer]
strict = true
implicit = false

[reactivity]
enabled = true
debounce_ms = 120
",
        )
        .unwrap();
        let options = RendererOptions::from(&config);
        assert!(options.strict);
        assert!(!options.implicit);
        assert!(options.annotate_warnings);
        assert!(options.reactive);
        assert_eq!(options.debounce, Duration::from_millis(120));
        assert_eq!(options.settle, Duration::from_millis(10));
    }

    #[test]
    fn test_render_options_builder() {
        let options = RenderOptions::new().reactive(true).select("p.lead").stringify();
        assert_eq!(options.reactive, Some(true));
        assert_eq!(options.select.as_deref(), Some("p.lead"));
        assert!(options.stringify);
        assert_eq!(options.strict, None);
    }
}
