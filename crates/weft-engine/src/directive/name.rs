use std::fmt;

use regex::Regex;

/// Attribute pattern a directive binds to.
#[derive(Clone, Debug)]
pub enum DirectiveName {
    /// Matches the literal itself, or the literal followed by a tag or
    /// modifier (`*for.key[x]`). The literal is also the parse prefix.
    Literal(String),
    /// Matches any attribute the regex accepts; `prefix` is stripped before
    /// parsing the rest of the name.
    Pattern { prefix: String, regex: Regex },
}

impl DirectiveName {
    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal(name.into())
    }

    /// Compile a pattern name.
    pub fn pattern(prefix: impl Into<String>, source: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern {
            prefix: prefix.into(),
            regex: Regex::new(source)?,
        })
    }

    /// Whether an attribute name belongs to this directive.
    #[must_use]
    pub fn matches(&self, attribute: &str) -> bool {
        match self {
            Self::Literal(name) => attribute
                .strip_prefix(name.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['[', '.'])),
            Self::Pattern { regex, .. } => regex.is_match(attribute),
        }
    }

    /// Prefix stripped by the attribute grammar.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self {
            Self::Literal(name) => name,
            Self::Pattern { prefix, .. } => prefix,
        }
    }

    /// Uniqueness key among loaded directives.
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::Literal(name) => name.clone(),
            Self::Pattern { regex, .. } => format!("/{}/", regex.as_str()),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::Literal(name) => name.is_empty(),
            Self::Pattern { regex, .. } => regex.as_str().is_empty(),
        }
    }
}

impl fmt::Display for DirectiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}
