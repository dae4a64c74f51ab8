//! Route pattern compilation.
//!
//! # Syntax
//! - literal text matches itself (`/users/list`)
//! - `{name}` matches one non-empty path segment (`[^/]+`)
//! - `{name:regex}` matches `regex`, which may span segments (`{path:.*}`)
//!
//! Patterns are compiled into one anchored regex at registration time so a
//! malformed pattern is rejected before it can reach a restart.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use percent_encoding::percent_decode_str;
use regex::Regex;
use thiserror::Error;

const DEFAULT_VARIABLE_REGEX: &str = "[^/]+";

/// Percent-decode a request path before it is matched or used as a key.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

/// Reasons a route pattern is rejected.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("pattern `{0}` has unbalanced braces")]
    UnbalancedBraces(String),

    #[error("pattern `{pattern}` has an empty or invalid variable name `{name}`")]
    InvalidVariable { pattern: String, name: String },

    #[error("pattern `{pattern}` declares variable `{name}` twice")]
    DuplicateVariable { pattern: String, name: String },

    #[error("pattern `{pattern}` does not compile: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Variables extracted from the request path by the matching route.
///
/// Inserted into the request extensions before a handler runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A compiled route template.
#[derive(Clone)]
pub struct RoutePattern {
    template: String,
    regex: Regex,
    variables: Vec<String>,
}

impl RoutePattern {
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        if !template.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(template.to_string()));
        }

        let mut source = String::from("^");
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();

                    let body = read_variable(&mut chars)
                        .ok_or_else(|| PatternError::UnbalancedBraces(template.to_string()))?;
                    let (name, expr) = match body.split_once(':') {
                        Some((name, expr)) => (name, expr),
                        None => (body.as_str(), DEFAULT_VARIABLE_REGEX),
                    };

                    if !is_identifier(name) {
                        return Err(PatternError::InvalidVariable {
                            pattern: template.to_string(),
                            name: name.to_string(),
                        });
                    }
                    if variables.iter().any(|v| v == name) {
                        return Err(PatternError::DuplicateVariable {
                            pattern: template.to_string(),
                            name: name.to_string(),
                        });
                    }

                    source.push_str(&format!("(?P<{name}>{expr})"));
                    variables.push(name.to_string());
                }
                '}' => return Err(PatternError::UnbalancedBraces(template.to_string())),
                other => literal.push(other),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        let regex = Regex::new(&source).map_err(|source| PatternError::Regex {
            pattern: template.to_string(),
            source,
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            variables,
        })
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match `path`, returning the extracted variables.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        let params = self
            .variables
            .iter()
            .filter_map(|name| caps.name(name).map(|m| (name.clone(), m.as_str().to_string())))
            .collect();
        Some(PathParams(params))
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.template).finish()
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
    }
}

/// Read up to the brace closing the current variable, honouring nested
/// braces inside the regex part (`{id:[0-9]{3}}`).
fn read_variable(chars: &mut std::str::Chars<'_>) -> Option<String> {
    let mut depth = 1;
    let mut body = String::new();
    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(body);
                }
            }
            _ => {}
        }
        body.push(c);
    }
    None
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern() {
        let pattern = RoutePattern::parse("/myfunc").unwrap();
        assert!(pattern.is_match("/myfunc"));
        assert!(!pattern.is_match("/myfunc/extra"));
        assert!(!pattern.is_match("/other"));
    }

    #[test]
    fn literal_text_is_escaped() {
        let pattern = RoutePattern::parse("/file.json").unwrap();
        assert!(pattern.is_match("/file.json"));
        assert!(!pattern.is_match("/fileXjson"));
    }

    #[test]
    fn segment_variable() {
        let pattern = RoutePattern::parse("/users/{id}").unwrap();
        let params = pattern.captures("/users/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert!(pattern.captures("/users/42/posts").is_none());
        assert!(pattern.captures("/users/").is_none());
    }

    #[test]
    fn custom_regex_variable_spans_segments() {
        let pattern = RoutePattern::parse("/{path:.*}").unwrap();
        assert_eq!(pattern.captures("/").unwrap().get("path"), Some(""));
        assert_eq!(pattern.captures("/a/b/c").unwrap().get("path"), Some("a/b/c"));
    }

    #[test]
    fn nested_braces_in_regex() {
        let pattern = RoutePattern::parse("/code/{id:[0-9]{3}}").unwrap();
        assert!(pattern.is_match("/code/123"));
        assert!(!pattern.is_match("/code/12"));
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(matches!(
            RoutePattern::parse("no-slash"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/{open"),
            Err(PatternError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/close}"),
            Err(PatternError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/{}"),
            Err(PatternError::InvalidVariable { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/{a}/{a}"),
            Err(PatternError::DuplicateVariable { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/{a:(}"),
            Err(PatternError::Regex { .. })
        ));
    }

    #[test]
    fn decodes_percent_encoded_paths() {
        assert_eq!(decode_path("/hello%20world"), "/hello world");
        assert_eq!(decode_path("/caf%C3%A9"), "/café");
        assert_eq!(decode_path("/plain"), "/plain");
        assert_eq!(decode_path("/bad%FF"), "/bad\u{FFFD}");
    }
}
