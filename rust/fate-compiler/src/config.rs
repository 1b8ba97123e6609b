//! Compiler configuration, read from the `[compiler]` table of `fate.toml`.

use crate::compiler::pipeline::PassKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "fate.toml";

/// Names every module can reference without declaring them.
pub const DEFAULT_GLOBALS: &[&str] =
    &["Any", "Array", "Boolean", "Function", "Integer", "Null", "Number", "Object", "String"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid compiler config: {0}")]
    Invalid(#[from] toml::de::Error),
}

// ── Compile options ─────────────────────────────────────────────────

/// Options controlling the pass pipeline and code generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompileOptions {
    /// Passes to run, in order. Default: pattern, rewrite, validate.
    pub passes: Vec<PassKind>,
    /// Host globals pre-declared on the module scope.
    pub globals: Vec<String>,
    /// Strings longer than this are hoisted instead of inlined. Default: 32.
    pub inline_string_limit: usize,
    /// Emit `"use strict"`. Default: `true`.
    pub strict_mode: bool,
    /// Spaces per indentation level in generated code. Default: 2.
    pub indent: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            passes: PassKind::default_pipeline(),
            globals: DEFAULT_GLOBALS.iter().map(|g| g.to_string()).collect(),
            inline_string_limit: 32,
            strict_mode: true,
            indent: 2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    compiler: CompileOptions,
}

impl CompileOptions {
    /// Parse the `[compiler]` table of a `fate.toml` document. A document
    /// without the table yields the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        Ok(file.compiler)
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        Ok(file.compiler)
    }

    /// Search `start` and its ancestors for `fate.toml`.
    pub fn find_and_load(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                let options = Self::load_from(&config_path)?;
                tracing::debug!(path = %config_path.display(), "loaded compiler config");
                return Ok(Some((config_path, options)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_returns_default() {
        let options = CompileOptions::from_toml_str("").unwrap();
        assert_eq!(options, CompileOptions::default());
        assert_eq!(options.globals.len(), DEFAULT_GLOBALS.len());
    }

    #[test]
    fn parse_partial_table() {
        let options = CompileOptions::from_toml_str(
            r#"
[compiler]
passes = ["rewrite", "validate"]
inline-string-limit = 8
strict-mode = false
"#,
        )
        .unwrap();
        assert_eq!(options.passes, vec![PassKind::Rewrite, PassKind::Validate]);
        assert_eq!(options.inline_string_limit, 8);
        assert!(!options.strict_mode);
        assert_eq!(options.indent, 2);
    }

    #[test]
    fn unknown_pass_is_an_error() {
        let err = CompileOptions::from_toml_str("[compiler]\npasses = [\"inline\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = CompileOptions::load_from(Path::new("/nonexistent/fate.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fate.toml"));
    }
}
