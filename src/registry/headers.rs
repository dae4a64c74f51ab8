//! Headers applied to every served message.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid header name `{0}`")]
    Name(String),

    #[error("invalid value for header `{name}`")]
    Value { name: String },
}

/// Copy-on-write header set.
///
/// Requests read a snapshot without locking; writers publish a new map.
#[derive(Debug)]
pub struct HeaderSet {
    inner: ArcSwap<HeaderMap>,
}

impl HeaderSet {
    /// Header set holding `Content-Type: application/json`.
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            inner: ArcSwap::from_pointee(headers),
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: ArcSwap::from_pointee(HeaderMap::new()),
        }
    }

    /// Set `name` to `value`, replacing any previous value.
    pub fn set(&self, name: &str, value: &str) -> Result<(), HeaderError> {
        let (name, value) = parse_header(name, value)?;
        self.inner.rcu(|current| {
            let mut next = HeaderMap::clone(current);
            next.insert(name.clone(), value.clone());
            next
        });
        tracing::info!(header = %name, "Response header set");
        Ok(())
    }

    /// Remove `name`. Returns whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            return false;
        };
        let previous = self.inner.rcu(|current| {
            let mut next = HeaderMap::clone(current);
            next.remove(&name);
            next
        });
        let existed = previous.contains_key(&name);
        tracing::info!(header = %name, existed, "Response header deleted");
        existed
    }

    /// Replace the whole set at once. Nothing changes if any pair is invalid.
    pub fn replace_all<'a, I>(&self, pairs: I) -> Result<(), HeaderError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut next = HeaderMap::new();
        for (name, value) in pairs {
            let (name, value) = parse_header(name, value)?;
            next.insert(name, value);
        }
        tracing::info!(count = next.len(), "Response headers replaced");
        self.inner.store(Arc::new(next));
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<HeaderMap> {
        self.inner.load_full()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner
            .load()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Copy every configured header onto `target`.
    pub fn apply(&self, target: &mut HeaderMap) {
        let headers = self.inner.load();
        for (name, value) in headers.iter() {
            target.insert(name.clone(), value.clone());
        }
    }
}

impl Default for HeaderSet {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HeaderError> {
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| HeaderError::Name(name.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|_| HeaderError::Value {
        name: name.to_string(),
    })?;
    Ok((header_name, header_value))
}
