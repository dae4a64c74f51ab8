//! Path → message storage.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use dashmap::DashMap;

/// Strip every leading `/` and anything from the first `?` on.
///
/// `"/hello"`, `"hello"` and `"hello?x=1"` all normalize to `"hello"`.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_start_matches('/');
    match trimmed.find('?') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    }
}

/// Body and status served for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEntry {
    body: String,
    status: StatusCode,
}

impl ResponseEntry {
    pub fn new(body: impl Into<String>, status: StatusCode) -> Self {
        Self {
            body: body.into(),
            status,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

/// Messages served by the built-in handlers, plus the mutation gate.
///
/// Shared between management calls and in-flight requests; one entry per
/// normalized path, last write wins.
#[derive(Debug)]
pub struct ResponseRegistry {
    messages: DashMap<String, ResponseEntry>,
    mutable: AtomicBool,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            mutable: AtomicBool::new(true),
        }
    }

    /// Store `body` under `path` with status 200.
    pub fn set_message(&self, path: &str, body: impl Into<String>) {
        self.set_message_with_status(path, body, StatusCode::OK);
    }

    pub fn set_message_with_status(&self, path: &str, body: impl Into<String>, status: StatusCode) {
        let key = normalize_path(path);
        tracing::info!(path = key, status = status.as_u16(), "Message registered");
        self.messages
            .insert(key.to_string(), ResponseEntry::new(body, status));
    }

    /// Remove the entry for `path`. Absence is not an error.
    pub fn delete_message(&self, path: &str) -> Option<ResponseEntry> {
        let key = normalize_path(path);
        let removed = self.messages.remove(key).map(|(_, entry)| entry);
        tracing::info!(
            path = key,
            existed = removed.is_some(),
            "Message deleted"
        );
        removed
    }

    pub fn message(&self, path: &str) -> Option<ResponseEntry> {
        self.messages
            .get(normalize_path(path))
            .map(|entry| entry.value().clone())
    }

    /// Normalized paths currently registered, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.messages.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn enable_mutation(&self) {
        self.set_mutation(true);
    }

    pub fn disable_mutation(&self) {
        self.set_mutation(false);
    }

    pub fn set_mutation(&self, enabled: bool) {
        let previous = self.mutable.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(enabled, "Message mutation toggled");
        }
    }

    pub fn mutation_enabled(&self) -> bool {
        self.mutable.load(Ordering::SeqCst)
    }
}

impl Default for ResponseRegistry {
    fn default() -> Self {
        Self::new()
    }
}
