//! Error types for the rendering engine.

use std::fmt;

use weft_dom::{DomError, NodeId};

use crate::Phase;

/// Error raised while compiling or evaluating an expression.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ExpressionError {
    /// The source could not be tokenized or parsed.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset into the source.
        offset: usize,
        /// What was expected.
        message: String,
    },

    /// An identifier resolved to nothing.
    #[error("{0} is not defined")]
    Reference(String),

    /// An operation was applied to a value of the wrong type.
    #[error("type error: {0}")]
    Type(String),

    /// An identifier uses the prefix reserved for engine bookkeeping.
    #[error("identifier {0} uses a reserved prefix")]
    Reserved(String),

    /// A call target is not a function.
    #[error("{0} is not a function")]
    NotCallable(String),

    /// A callable reported a failure.
    #[error("{0}")]
    Runtime(String),
}

/// Error raised by node morphing.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MorphError {
    /// The node is not a placeholder created by this renderer.
    #[error("node {0} is not a known placeholder")]
    UnknownPlaceholder(NodeId),

    /// Only elements can be deactivated or used as templates.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    /// Two expansion instances would share one key.
    #[error("duplicate expansion key {0:?}")]
    DuplicateKey(String),

    /// Underlying tree mutation failed.
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Error raised by the cache registry.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The name is reserved for node identity bookkeeping.
    #[error("cache name {0:?} is reserved")]
    Reserved(String),

    /// A cache with that name already exists with another value type.
    #[error("cache {0:?} holds a different value type")]
    TypeMismatch(String),
}

/// Error returned by directive hooks.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DirectiveError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Morph(#[from] MorphError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Free-form failure.
    #[error("{0}")]
    Message(String),
}

impl DirectiveError {
    /// Create a free-form error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Lifecycle hook of a directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    Init,
    Setup,
    Execute,
    Cleanup,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Setup => "setup",
            Self::Execute => "execute",
            Self::Cleanup => "cleanup",
        })
    }
}

/// A hook failure recovered at a subtree boundary.
#[derive(Debug)]
pub struct HookFailure {
    /// Node being processed when the hook failed.
    pub node: NodeId,
    /// Identity of the failing directive.
    pub directive: String,
    /// Phase of the failing directive.
    pub phase: Phase,
    /// Failing hook.
    pub hook: Hook,
    /// Error returned by the hook.
    pub error: DirectiveError,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} failed on {}: {}",
            self.directive, self.hook, self.node, self.error
        )
    }
}

/// Error returned by [`Renderer`](crate::Renderer) operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RenderError {
    /// A directive cannot be loaded at all.
    #[error("invalid directive: {0}")]
    InvalidDirective(String),

    /// A directive `init` hook failed.
    #[error("failed to initialize directive {directive}")]
    Init {
        /// Identity of the directive.
        directive: String,
        #[source]
        source: DirectiveError,
    },

    /// A supplied context or state uses a reserved identifier.
    #[error("{0} uses a reserved identifier prefix")]
    Reserved(String),

    #[error(transparent)]
    Dom(#[from] DomError),

    /// Strict mode: every hook failure of the call.
    #[error("{} directive hook(s) failed", .0.len())]
    Aggregate(Vec<HookFailure>),
}
