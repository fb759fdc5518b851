//! Token expansion against build metadata
//!
//! Recognized placeholders are `${NAME}` and `$NAME`; `$$` yields a literal
//! `$`. Unknown names are left verbatim unless the expander is strict, so a
//! manifest command such as `java -jar app.jar --port $PORT` survives.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(?P<escape>\$)|\{(?P<braced>[^}]*)\}|(?P<bare>[A-Za-z_][A-Za-z0-9_]*)|(?P<open>\{))")
        .expect("token pattern is valid")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("name pattern is valid"));

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unterminated '${{' at offset {position}")]
    Unterminated { position: usize },

    #[error("invalid token name '{name}'")]
    InvalidName { name: String },

    #[error("undefined token(s): {}", names.join(", "))]
    Undefined { names: Vec<String> },
}

/// Substitutes build metadata placeholders in configuration strings
pub trait TokenExpander: Send + Sync {
    fn expand(&self, raw: &str) -> Result<String, TokenError>;
}

/// Expander backed by a build variable map, optionally falling back to the
/// process environment.
#[derive(Debug, Clone, Default)]
pub struct BuildContextExpander {
    vars: HashMap<String, String>,
    use_process_env: bool,
    strict: bool,
}

impl BuildContextExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_process_env(mut self) -> Self {
        self.use_process_env = true;
        self
    }

    /// Unknown names become [`TokenError::Undefined`] instead of passing through
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned().or_else(|| {
            if self.use_process_env {
                std::env::var(name).ok()
            } else {
                None
            }
        })
    }
}

impl TokenExpander for BuildContextExpander {
    fn expand(&self, raw: &str) -> Result<String, TokenError> {
        let mut out = String::with_capacity(raw.len());
        let mut undefined = Vec::new();
        let mut last = 0;

        for caps in TOKEN_RE.captures_iter(raw) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&raw[last..whole.start()]);
            last = whole.end();

            if caps.name("escape").is_some() {
                out.push('$');
                continue;
            }
            if caps.name("open").is_some() {
                return Err(TokenError::Unterminated {
                    position: whole.start(),
                });
            }

            let name = match (caps.name("braced"), caps.name("bare")) {
                (Some(braced), _) => {
                    let name = braced.as_str().trim();
                    if !NAME_RE.is_match(name) {
                        return Err(TokenError::InvalidName {
                            name: name.to_string(),
                        });
                    }
                    name
                }
                (None, Some(bare)) => bare.as_str(),
                (None, None) => continue,
            };

            match self.lookup(name) {
                Some(value) => out.push_str(&value),
                None => {
                    if self.strict {
                        undefined.push(name.to_string());
                    }
                    out.push_str(whole.as_str());
                }
            }
        }
        out.push_str(&raw[last..]);

        if !undefined.is_empty() {
            return Err(TokenError::Undefined { names: undefined });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expander() -> BuildContextExpander {
        BuildContextExpander::new()
            .with_var("BUILD_NUMBER", "42")
            .with_var("BUILD_DISPLAY_NAME", "#42")
            .with_var("JOB_NAME", "hello-java")
    }

    #[test]
    fn test_braced_and_bare_tokens() {
        let out = expander()
            .expand("${JOB_NAME}-$BUILD_NUMBER built as $BUILD_DISPLAY_NAME")
            .unwrap();
        assert_eq!(out, "hello-java-42 built as #42");
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        let out = expander().expand("java -jar app.jar --port $PORT ${HOME_DIR}").unwrap();
        assert_eq!(out, "java -jar app.jar --port $PORT ${HOME_DIR}");
    }

    #[test]
    fn test_strict_collects_all_undefined() {
        let err = expander().strict().expand("$A and ${B} and $JOB_NAME").unwrap_err();
        assert_eq!(
            err,
            TokenError::Undefined {
                names: vec!["A".into(), "B".into()]
            }
        );
    }

    #[test]
    fn test_escape_and_malformed() {
        assert_eq!(expander().expand("cost: $$5").unwrap(), "cost: $5");
        assert_eq!(expander().expand("trailing $").unwrap(), "trailing $");
        assert!(matches!(
            expander().expand("name: ${JOB_NAME"),
            Err(TokenError::Unterminated { position: 6 })
        ));
        assert!(matches!(
            expander().expand("${not valid}"),
            Err(TokenError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_process_env_fallback() {
        std::env::set_var("LIFTOFF_TOKEN_TEST_VAR", "from-env");
        let out = BuildContextExpander::new()
            .with_process_env()
            .expand("${LIFTOFF_TOKEN_TEST_VAR}")
            .unwrap();
        assert_eq!(out, "from-env");
        std::env::remove_var("LIFTOFF_TOKEN_TEST_VAR");

        let isolated = BuildContextExpander::new().expand("$LIFTOFF_TOKEN_TEST_VAR").unwrap();
        assert_eq!(isolated, "$LIFTOFF_TOKEN_TEST_VAR");
    }
}
