//! Route template compilation.
//!
//! A template such as `/users/{id}/posts/{post}` compiles to the anchored regex
//! `^/users/(?P<id>[^/]+)/posts/(?P<post>[^/]+)/?$`: every `{name}` becomes a
//! named group matching one non-empty path segment, literal text is escaped,
//! and a single trailing slash is optional.
//!
//! Templates are compiled on demand for each match attempt; nothing is cached
//! between requests. [`Router::validate`](super::Router::validate) compiles
//! every registered template once at startup so a broken one is caught early.

use regex::Regex;
use thiserror::Error;

use crate::context::Parameters;

/// Reasons a route template cannot be compiled.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("placeholder `{{{name}}}` in `{template}` is not a valid identifier")]
    InvalidPlaceholder { template: String, name: String },

    #[error("placeholder `{{{name}}}` appears more than once in `{template}`")]
    DuplicatePlaceholder { template: String, name: String },

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// A compiled route template.
///
/// # Examples
///
/// ```
/// use routekit::router::Pattern;
///
/// let pattern = Pattern::compile("/users/{id}").unwrap();
/// assert!(pattern.is_match("/users/42"));
/// assert!(pattern.is_match("/users/42/"));
/// assert!(!pattern.is_match("/users/42/extra"));
/// assert_eq!(pattern.extract("/users/42").get("id"), Some("42"));
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl Pattern {
    /// Compiles `template`.
    ///
    /// # Errors
    ///
    /// - [`PatternError::InvalidPlaceholder`]: a name is empty or not `[A-Za-z_][A-Za-z0-9_]*`.
    /// - [`PatternError::DuplicatePlaceholder`]: the same name is used twice.
    /// - [`PatternError::Regex`]: the resulting expression is rejected by `regex`.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let mut source = String::with_capacity(template.len() + 16);
        let mut names: Vec<String> = Vec::new();
        source.push('^');

        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let Some(len) = rest[open..].find('}') else {
                break;
            };
            let name = &rest[open + 1..open + len];
            if !is_identifier(name) {
                return Err(PatternError::InvalidPlaceholder {
                    template: template.to_owned(),
                    name: name.to_owned(),
                });
            }
            if names.iter().any(|n| n == name) {
                return Err(PatternError::DuplicatePlaceholder {
                    template: template.to_owned(),
                    name: name.to_owned(),
                });
            }

            source.push_str(&regex::escape(&rest[..open]));
            source.push_str(&format!("(?P<{name}>[^/]+)"));
            names.push(name.to_owned());
            rest = &rest[open + len + 1..];
        }
        source.push_str(&regex::escape(rest));
        source.push_str("/?$");

        Ok(Self {
            template: template.to_owned(),
            regex: Regex::new(&source)?,
            names,
        })
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in template order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `true` when the template has no placeholders.
    pub fn is_literal(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The placeholder bindings for `path`, or `None` if it does not match.
    pub fn captures(&self, path: &str) -> Option<Parameters> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .filter_map(|name| caps.name(name).map(|m| (name.as_str(), m.as_str())))
                .collect(),
        )
    }

    /// Like [`captures`](Self::captures) but yields empty bindings for a non-matching path.
    pub fn extract(&self, path: &str) -> Parameters {
        self.captures(path).unwrap_or_default()
    }
}

/// Compiles `template` and tests `path` against it.
///
/// # Errors
///
/// Any [`PatternError`] from compiling the template.
pub fn matches(template: &str, path: &str) -> Result<bool, PatternError> {
    Ok(Pattern::compile(template)?.is_match(path))
}

/// Compiles `template` and extracts the bindings for `path` (empty when it does not match).
///
/// # Errors
///
/// Any [`PatternError`] from compiling the template.
pub fn extract(template: &str, path: &str) -> Result<Parameters, PatternError> {
    Ok(Pattern::compile(template)?.extract(path))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
