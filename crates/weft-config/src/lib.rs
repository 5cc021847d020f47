//! `weft.toml` loading for hosts of the weft engine.
//!
//! A config file sets renderer defaults, reactive scheduling and the initial
//! context. [`Config::load`] takes an explicit file, or looks for `weft.toml`
//! in the working directory and its ancestors, or falls back to defaults.
//! Host flags are layered on top through [`Overrides`].
//!
//! String values under `[context]` may reference the environment as `${VAR}`
//! (error when unset) or `${VAR:-fallback}`.
//!
//! ```toml
//! [renderer]
//! strict = true
//!
//! [reactivity]
//! enabled = true
//! debounce_ms = 25
//!
//! [context]
//! title = "${SITE_TITLE:-Untitled}"
//! ```

mod expand;

use std::path::{Path, PathBuf};

use serde::Deserialize;

const FILE_NAME: &str = "weft.toml";

/// Mirrors the reserved identifier prefix of the expression evaluator.
const RESERVED_PREFIX: &str = "__";

const MAX_DEBOUNCE_MS: u64 = 60_000;
const MAX_SETTLE_MS: u64 = 10_000;

/// Host-side values that win over the file. `None` keeps the file value.
#[derive(Debug, Default)]
pub struct Overrides {
    pub strict: Option<bool>,
    pub reactive: Option<bool>,
    pub debounce_ms: Option<u64>,
}

/// Parsed `weft.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub renderer: RendererConfig,
    pub reactivity: ReactivityConfig,
    /// Initial context variables, after environment substitution.
    pub context: toml::Table,
    /// File the config was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// `[renderer]`: defaults for every render call.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Return hook failures as one aggregate error instead of warnings.
    pub strict: bool,
    pub implicit: bool,
    /// Write hook failures onto the failing node when no sink is set.
    pub annotate_warnings: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            strict: false,
            implicit: true,
            annotate_warnings: true,
        }
    }
}

/// `[reactivity]`: re-render scheduling.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReactivityConfig {
    pub enabled: bool,
    /// Quiet period after the last write before a batch is drained.
    pub debounce_ms: u64,
    /// Extra delay between the quiet period and the drain.
    pub settle_ms: u64,
}

impl Default for ReactivityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: 50,
            settle_ms: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Validation(String),

    /// A `${VAR}` reference could not be resolved.
    #[error("{field}: {message}")]
    EnvVar {
        /// Dotted path of the value, e.g. `context.title`.
        field: String,
        message: String,
    },
}

impl Config {
    /// Load the explicit file, else the nearest `weft.toml`, else defaults,
    /// then apply `overrides`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotFound`] when `config_path` is given but missing;
    /// read, parse, substitution and validation errors otherwise.
    pub fn load(
        config_path: Option<&Path>,
        overrides: Option<&Overrides>,
    ) -> Result<Self, ConfigError> {
        let source = match config_path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_upwards(),
        };
        let mut config = match source {
            Some(path) => {
                let mut config = Self::from_toml(&std::fs::read_to_string(&path)?)?;
                config.config_path = Some(path);
                config
            }
            None => Self::default(),
        };

        if let Some(overrides) = overrides {
            config.renderer.strict = overrides.strict.unwrap_or(config.renderer.strict);
            config.reactivity.enabled = overrides.reactive.unwrap_or(config.reactivity.enabled);
            config.reactivity.debounce_ms =
                overrides.debounce_ms.unwrap_or(config.reactivity.debounce_ms);
            config.validate()?;
        }
        Ok(config)
    }

    /// Parse a config from TOML text. No discovery; `config_path` stays unset.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        for (key, value) in &mut config.context {
            expand::expand_value(value, &format!("context.{key}"))?;
        }
        config.validate()?;
        Ok(config)
    }

    fn find_upwards() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        cwd.ancestors()
            .map(|dir| dir.join(FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Check value ranges and reserved context names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reactivity = &self.reactivity;
        if reactivity.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "reactivity.debounce_ms is {}, the maximum is {MAX_DEBOUNCE_MS}",
                reactivity.debounce_ms
            )));
        }
        if reactivity.settle_ms > MAX_SETTLE_MS {
            return Err(ConfigError::Validation(format!(
                "reactivity.settle_ms is {}, the maximum is {MAX_SETTLE_MS}",
                reactivity.settle_ms
            )));
        }
        if let Some(key) = self
            .context
            .keys()
            .find(|key| key.starts_with(RESERVED_PREFIX))
        {
            return Err(ConfigError::Validation(format!(
                "context.{key}: names starting with {RESERVED_PREFIX:?} are reserved"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.renderer.strict);
        assert!(config.renderer.implicit);
        assert!(config.renderer.annotate_warnings);
        assert!(!config.reactivity.enabled);
        assert_eq!(config.reactivity.debounce_ms, 50);
        assert_eq!(config.reactivity.settle_ms, 10);
        assert!(config.context.is_empty());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.reactivity.debounce_ms, 50);
        assert_eq!(config.config_path, None);
    }

    #[test]
    fn test_every_section() {
        let config = Config::from_toml(
            r#"
[renderer]
strict = true
implicit = false

[reactivity]
enabled = true
debounce_ms = 25
settle_ms = 0

[context]
count = 3
user = { name = "ada" }
"#,
        )
        .unwrap();
        assert!(config.renderer.strict);
        assert!(!config.renderer.implicit);
        assert!(config.renderer.annotate_warnings);
        assert!(config.reactivity.enabled);
        assert_eq!(config.reactivity.debounce_ms, 25);
        assert_eq!(config.reactivity.settle_ms, 0);
        assert_eq!(config.context["count"].as_integer(), Some(3));
        assert_eq!(config.context["user"]["name"].as_str(), Some("ada"));
    }

    #[test]
    fn test_debounce_out_of_range() {
        let error = Config::from_toml("[reactivity]\ndebounce_ms = 600000").unwrap_err();
        assert!(matches!(error, ConfigError::Validation(_)), "{error:?}");
        assert!(error.to_string().contains("debounce_ms"));
    }

    #[test]
    fn test_settle_out_of_range() {
        let error = Config::from_toml("[reactivity]\nsettle_ms = 10001").unwrap_err();
        assert!(error.to_string().contains("settle_ms"));
    }

    #[test]
    fn test_reserved_context_name() {
        let error = Config::from_toml("[context]\n__internal = 1").unwrap_err();
        assert!(error.to_string().contains("reserved"));
    }

    #[test]
    fn test_context_strings_are_expanded() {
        // SAFETY: no other test touches this variable
        unsafe { std::env::remove_var("WEFT_CONFIG_TITLE") };
        let config =
            Config::from_toml("[context]\ntitle = \"${WEFT_CONFIG_TITLE:-Untitled}\"").unwrap();
        assert_eq!(config.context["title"].as_str(), Some("Untitled"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let error = Config::load(Some(Path::new("/nonexistent/weft.toml")), None).unwrap_err();
        assert!(matches!(error, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_explicit_file_with_overrides() {
        let (_dir, path) = write_config("[reactivity]\nenabled = false\ndebounce_ms = 30");
        let overrides = Overrides {
            reactive: Some(true),
            ..Overrides::default()
        };
        let config = Config::load(Some(&path), Some(&overrides)).unwrap();

        assert!(config.reactivity.enabled);
        assert_eq!(config.reactivity.debounce_ms, 30);
        assert!(!config.renderer.strict);
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_overrides_are_validated() {
        let (_dir, path) = write_config("");
        let overrides = Overrides {
            debounce_ms: Some(MAX_DEBOUNCE_MS + 1),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::load(Some(&path), Some(&overrides)),
            Err(ConfigError::Validation(_))
        ));
    }
}
