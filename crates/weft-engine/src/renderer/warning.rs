use std::fmt;

use weft_dom::NodeId;

use crate::directive::LoadedDirective;
use crate::{DirectiveError, Hook, HookFailure, Pass, Renderer};

/// Attribute collecting failure messages on a node.
pub const WARN_ATTRIBUTE: &str = "*warn";

/// A non-fatal diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub node: Option<NodeId>,
    /// Identity of the directive involved.
    pub directive: Option<String>,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(directive) = &self.directive {
            write!(f, "{directive}: ")?;
        }
        f.write_str(&self.message)?;
        if let Some(node) = self.node {
            write!(f, " ({node})")?;
        }
        Ok(())
    }
}

impl Renderer {
    /// Emit a warning through the log and the configured sink.
    pub fn warn(&self, node: Option<NodeId>, directive: Option<&str>, message: impl Into<String>) {
        let warning = Warning {
            node,
            directive: directive.map(str::to_owned),
            message: message.into(),
        };
        tracing::warn!(
            node = ?warning.node,
            directive = ?warning.directive,
            warning = %warning.message,
            "Renderer warning"
        );
        if let Some(sink) = &self.inner.options.warnings {
            sink(&warning);
        }
    }

    /// Record a hook failure on the pass and report it.
    ///
    /// Strict passes only collect; the caller turns the collection into an
    /// aggregate error.
    pub(crate) fn fail(
        &self,
        pass: &Pass,
        node: NodeId,
        directive: &LoadedDirective,
        hook: Hook,
        error: DirectiveError,
    ) {
        let failure = HookFailure {
            node,
            directive: directive.identity.clone(),
            phase: directive.phase,
            hook,
            error,
        };
        tracing::warn!(
            node = %node,
            directive = %failure.directive,
            phase = %failure.phase,
            hook = %hook,
            error = %failure.error,
            "Directive hook failed"
        );
        if !pass.flags.strict {
            self.report(&failure);
        }
        pass.record(failure);
    }

    fn report(&self, failure: &HookFailure) {
        if let Some(sink) = &self.inner.options.warnings {
            sink(&Warning {
                node: Some(failure.node),
                directive: Some(failure.directive.clone()),
                message: failure.to_string(),
            });
        } else if self.inner.options.annotate_warnings {
            self.annotate(failure.node, &failure.to_string());
        }
    }

    /// Append `message` to the warning attribute of `node`, or of the element
    /// a placeholder stands for.
    fn annotate(&self, node: NodeId, message: &str) {
        let element = self.resolve(node);
        let mut document = self.document_mut();
        if !document.is_element(element) {
            return;
        }
        let value = match document.attribute(element, WARN_ATTRIBUTE) {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{message}"),
            _ => message.to_owned(),
        };
        if let Err(error) = document.set_attribute(element, WARN_ATTRIBUTE, value) {
            tracing::debug!(node = %element, error = %error, "Cannot annotate node");
        }
    }
}
