//! `${VAR}` and `${VAR:-default}` substitution inside the `[context]` table.
//!
//! Only the braced form is recognized; a bare `$VAR` stays literal. A
//! reference to an unset variable without a default is an error naming the
//! context path it appeared under.

use std::borrow::Cow;

use crate::ConfigError;

/// Name of the variable that could not be resolved.
struct Unset(String);

/// Substitute variable references in one string.
fn substitute<'a>(raw: &'a str, path: &str) -> Result<Cow<'a, str>, ConfigError> {
    if !raw.contains("${") {
        return Ok(Cow::Borrowed(raw));
    }
    shellexpand::env_with_context(raw, |name| {
        std::env::var(name)
            .map(Some)
            .map_err(|_| Unset(name.to_owned()))
    })
    .map_err(|error| ConfigError::EnvVar {
        field: path.to_owned(),
        message: format!("${{{}}} is not set and has no default", error.cause.0),
    })
}

/// Substitute every string reachable from `value`, descending into arrays and
/// tables. `path` names `value` in error messages.
pub(crate) fn expand_value(value: &mut toml::Value, path: &str) -> Result<(), ConfigError> {
    match value {
        toml::Value::String(text) => {
            if let Cow::Owned(expanded) = substitute(text, path)? {
                *text = expanded;
            }
        }
        toml::Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                expand_value(item, &format!("{path}[{index}]"))?;
            }
        }
        toml::Value::Table(table) => {
            for (key, item) in table.iter_mut() {
                expand_value(item, &format!("{path}.{key}"))?;
            }
        }
        toml::Value::Integer(_)
        | toml::Value::Float(_)
        | toml::Value::Boolean(_)
        | toml::Value::Datetime(_) => {}
    }
    Ok(())
}
