//! Expression evaluation.
//!
//! Directive values are small JavaScript-flavoured expressions evaluated
//! against two merged scopes: the per-pass [`State`] shadows the reactive
//! [`Context`]. Sources are compiled to an AST once and memoized per
//! renderer.
//!
//! Supported syntax: number, string (`'`, `"`, `` ` ``, no interpolation),
//! boolean, `null` and `undefined` literals; arrays and objects; member access
//! (`a.b`, `a[k]`, `.length`); calls of context callables; unary `! - +`;
//! binary `* / % + - < <= > >= == != === !== && || ??`; the ternary operator;
//! assignment `= += -=`; and `;` sequences.
//!
//! Equality is always strict. `null` stands in for `undefined`.

mod eval;
mod lexer;
mod parser;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use weft_dom::NodeId;

use crate::{Context, ExpressionError, Renderer, State};
use eval::{Evaluated, Scope};
use parser::Expr;

/// Identifier prefix reserved for engine bookkeeping.
pub(crate) const RESERVED_PREFIX: &str = "__";

/// Scopes for [`Renderer::evaluate`].
#[derive(Clone, Copy, Default)]
pub struct EvaluateOptions<'a> {
    /// Reactive scope. An empty context is used when absent.
    pub context: Option<&'a Context>,
    /// Per-pass scope, shadowing the context.
    pub state: Option<&'a State>,
    /// Invocation arguments. When present and the expression evaluates to a
    /// function, the function is called with them. Also visible as `args`.
    pub args: Option<&'a [Value]>,
}

impl<'a> EvaluateOptions<'a> {
    #[must_use]
    pub fn new(context: &'a Context, state: &'a State) -> Self {
        Self {
            context: Some(context),
            state: Some(state),
            args: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: &'a [Value]) -> Self {
        self.args = Some(args);
        self
    }
}

/// Compiled expressions kept before the memo starts over.
const MAX_COMPILED: usize = 4096;

/// Compiled-expression memo, keyed by source text. Cleared when it reaches
/// its capacity, so generated sources cannot grow it without bound.
pub(crate) struct Expressions {
    compiled: RefCell<HashMap<String, Rc<Expr>>>,
    capacity: usize,
}

impl Default for Expressions {
    fn default() -> Self {
        Self::with_capacity(MAX_COMPILED)
    }
}

impl Expressions {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            compiled: RefCell::new(HashMap::new()),
            capacity,
        }
    }

    fn compile(&self, source: &str) -> Result<Rc<Expr>, ExpressionError> {
        if let Some(expr) = self.compiled.borrow().get(source) {
            return Ok(Rc::clone(expr));
        }
        let expr = Rc::new(parser::parse(source)?);
        let mut compiled = self.compiled.borrow_mut();
        if compiled.len() >= self.capacity {
            tracing::debug!(entries = compiled.len(), "Expression memo full, clearing");
            compiled.clear();
        }
        compiled.insert(source.to_owned(), Rc::clone(&expr));
        Ok(expr)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.compiled.borrow().len()
    }
}

/// Whether a scope key collides with the reserved prefix.
pub(crate) fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

impl Renderer {
    /// Evaluate an expression for `node`.
    ///
    /// Identifiers resolve against `args`, then state, then context values,
    /// then context callables.
    ///
    /// # Example
    ///
    /// ```
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use serde_json::json;
    /// use weft_dom::Document;
    /// use weft_engine::{Context, EvaluateOptions, Renderer, RendererOptions, State};
    ///
    /// let document = Rc::new(RefCell::new(Document::new()));
    /// let root = document.borrow().root();
    /// let renderer = Renderer::new(document, RendererOptions::default());
    ///
    /// let context = Context::from_values(json!({"count": 2}));
    /// let state = State::new().with("step", json!(3));
    /// let options = EvaluateOptions::new(&context, &state);
    ///
    /// let value = renderer.evaluate(root, "count * step", options).unwrap();
    /// assert_eq!(value, json!(6));
    /// ```
    pub fn evaluate(
        &self,
        node: NodeId,
        source: &str,
        options: EvaluateOptions<'_>,
    ) -> Result<Value, ExpressionError> {
        let expr = self.inner.expressions.compile(source)?;
        let fallback;
        let context = if let Some(context) = options.context {
            context
        } else {
            fallback = Context::new();
            &fallback
        };
        if let Some(key) = options
            .state
            .into_iter()
            .flat_map(State::keys)
            .find(|key| is_reserved(key))
        {
            return Err(ExpressionError::Reserved(key.clone()));
        }

        tracing::trace!(node = %node, source, "Evaluating expression");
        let scope = Scope {
            context,
            state: options.state,
            args: options.args,
        };
        match eval::evaluate(&expr, &scope)? {
            Evaluated::Value(value) => Ok(value),
            Evaluated::Function(function, name) => match options.args {
                Some(args) => function(args),
                None => Err(ExpressionError::Type(format!(
                    "{name} is a function; pass args to invoke it"
                ))),
            },
        }
    }
}
