//! Phased directive rendering over a [`weft_dom::Document`].
//!
//! A [`Renderer`] walks a document tree and runs pluggable [`Directive`]s on
//! every element. Directives bind to attributes by name, run in [`Phase`]
//! order, may swap their element for a placeholder comment and back (node
//! morphing), generate keyed instances of a template, and evaluate a small
//! expression language against a [`Context`] and a per-pass [`State`].
//!
//! With reactivity enabled, every node remembers the context paths its
//! directives read; writing one of those paths queues the node for a
//! debounced re-render.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::json;
//! use weft_dom::Document;
//! use weft_engine::{
//!     Context, Directive, DirectiveError, DirectiveName, EvaluateOptions, ExecuteArgs,
//!     Execution, Phase, RenderOptions, Renderer, RendererOptions, async_trait, to_display,
//! };
//!
//! struct Text;
//!
//! #[async_trait(?Send)]
//! impl Directive for Text {
//!     fn name(&self) -> DirectiveName {
//!         DirectiveName::literal("*text")
//!     }
//!
//!     fn phase(&self) -> Phase {
//!         Phase::CONTENT
//!     }
//!
//!     async fn execute(&self, args: ExecuteArgs<'_>) -> Result<Execution, DirectiveError> {
//!         let options = EvaluateOptions::new(args.context, args.state);
//!         let value = args.renderer.evaluate(args.node, &args.attributes[0].value, options)?;
//!         args.renderer.document_mut().set_text(args.element, to_display(&value));
//!         Ok(Execution::new())
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut document = Document::new();
//! let root = document.root();
//! document.append_markup(r#"<h1 *text="title"></h1>"#).unwrap();
//!
//! let renderer = Renderer::new(Rc::new(RefCell::new(document)), RendererOptions::default());
//! renderer.load([Rc::new(Text) as Rc<dyn Directive>]).await.unwrap();
//!
//! let context = Context::from_values(json!({"title": "Hello"}));
//! let rendered = renderer
//!     .render(root, RenderOptions::new().with_context(context).stringify())
//!     .await
//!     .unwrap();
//! assert_eq!(rendered.html(), Some(r#"<h1 *text="title">Hello</h1>"#));
//! # });
//! ```

mod attribute;
mod cache;
mod context;
mod directive;
mod error;
mod expression;
mod morph;
mod phase;
mod reactive;
mod renderer;
mod value;

pub use async_trait::async_trait;

pub use attribute::{
    AttributeRef, AttributeSyntax, BooleanTyping, Coerced, DurationTyping, Modifier,
    NumberTyping, ParseOptions, ParsedAttribute, StringTyping, TypedValue, Typing, Typings,
};
pub use cache::{IDENTITY_CACHE, NodeCache};
pub use context::{AccessKind, Callable, Context, ContextEvent, ContextId, ListenerId, State};
pub use directive::{
    CleanupArgs, Directive, DirectiveName, ExecuteArgs, Execution, Setup, SetupArgs,
};
pub use error::{
    CacheError, DirectiveError, ExpressionError, Hook, HookFailure, MorphError, RenderError,
};
pub use expression::EvaluateOptions;
pub use morph::{Instance, Placeholder};
pub use phase::Phase;
pub use reactive::FlushReport;
pub use renderer::{
    Pass, RenderOptions, Rendered, Renderer, RendererOptions, WARN_ATTRIBUTE, Warning,
    WarningSink,
};
pub use value::{to_display, truthy};
