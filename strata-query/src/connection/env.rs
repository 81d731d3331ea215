//! Environment variable expansion for URLs and configuration values.

use std::collections::HashMap;

use crate::error::{QueryError, QueryResult};

/// Where variables are looked up.
pub trait EnvSource: Send + Sync {
    /// Get a variable's value.
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Expands variable references in strings.
///
/// - `${VAR}` and `$VAR`: the variable must be set
/// - `${VAR:-default}`: `default` when unset or empty
///
/// A `$` not followed by a name is kept.
///
/// ```rust
/// use strata_query::connection::{EnvExpander, MapEnvSource};
///
/// let env = MapEnvSource::new().set("DB_HOST", "db.internal");
/// let expander = EnvExpander::with_source(env);
/// assert_eq!(
///     expander.expand("postgres://${DB_HOST}:${DB_PORT:-5432}/app").unwrap(),
///     "postgres://db.internal:5432/app"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvExpander<S: EnvSource = StdEnvSource> {
    source: S,
}

impl EnvExpander<StdEnvSource> {
    /// Expand against the process environment.
    pub fn new() -> Self {
        Self {
            source: StdEnvSource,
        }
    }
}

impl<S: EnvSource> EnvExpander<S> {
    /// Expand against a custom source.
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Expand every reference in `input`.
    pub fn expand(&self, input: &str) -> QueryResult<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(braced) = after.strip_prefix('{') {
                let end = braced.find('}').ok_or_else(|| {
                    QueryError::configuration(format!("unterminated '${{' in '{input}'"))
                })?;
                out.push_str(&self.braced(&braced[..end])?);
                rest = &braced[end + 1..];
                continue;
            }

            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];
            if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
                out.push('$');
                rest = after;
            } else {
                out.push_str(&self.lookup(name)?);
                rest = &after[name_len..];
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn braced(&self, inner: &str) -> QueryResult<String> {
        match inner.split_once(":-") {
            Some((name, default)) => Ok(self
                .source
                .get(name)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())),
            None if inner.is_empty() => Err(QueryError::configuration("empty variable name")),
            None => self.lookup(inner),
        }
    }

    fn lookup(&self, name: &str) -> QueryResult<String> {
        self.source.get(name).ok_or_else(|| {
            QueryError::configuration(format!("environment variable '{name}' is not set"))
                .with_suggestion(format!("Set {name} or use ${{{name}:-default}}"))
        })
    }

    /// Check if a string contains variable references.
    pub fn has_variables(input: &str) -> bool {
        input.contains('$')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn expander() -> EnvExpander<MapEnvSource> {
        EnvExpander::with_source(
            MapEnvSource::new()
                .set("HOST", "localhost")
                .set("PORT", "5432")
                .set("USER", "app")
                .set("EMPTY", ""),
        )
    }

    #[test]
    fn test_expand_simple_and_braced() {
        let e = expander();
        assert_eq!(e.expand("postgres://$HOST/db").unwrap(), "postgres://localhost/db");
        assert_eq!(
            e.expand("postgres://${USER}@${HOST}:${PORT}/db").unwrap(),
            "postgres://app@localhost:5432/db"
        );
        assert_eq!(e.expand("$HOST-$PORT").unwrap(), "localhost-5432");
    }

    #[test]
    fn test_expand_default() {
        let e = expander();
        assert_eq!(e.expand("${HOST:-other}").unwrap(), "localhost");
        assert_eq!(e.expand("${MISSING:-other}").unwrap(), "other");
        assert_eq!(e.expand("${EMPTY:-other}").unwrap(), "other");
        assert_eq!(e.expand("${MISSING:-}").unwrap(), "");
    }

    #[test]
    fn test_missing_variable() {
        let e = expander();
        for input in ["${MISSING}", "$MISSING", "${}", "${HOST"] {
            let err = e.expand(input).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidConfiguration, "{input}");
        }
        assert!(e.expand("$MISSING").unwrap_err().message.contains("MISSING"));
    }

    #[test]
    fn test_literal_dollar() {
        let e = expander();
        assert_eq!(e.expand("cost: $5").unwrap(), "cost: $5");
        assert_eq!(e.expand("trailing $").unwrap(), "trailing $");
        assert!(EnvExpander::<StdEnvSource>::has_variables("$X"));
        assert!(!EnvExpander::<StdEnvSource>::has_variables("plain"));
    }
}
