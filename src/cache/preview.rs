//! In-memory preview cache keyed by session.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::compiler::CompiledDocument;
use crate::detect::Framework;
use crate::freshness::ContentHash;
use crate::utils::time::now_ms;

/// Stable key for one preview: derived from the project (and route), never
/// random, so returning to the same preview finds the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(project_id: &str) -> Self {
        Self(format!("preview:{project_id}"))
    }

    /// Key for a specific route inside the project.
    pub fn with_route(project_id: &str, route: &str) -> Self {
        let route = route.trim_matches('/');
        if route.is_empty() {
            Self::new(project_id)
        } else {
            Self(format!("preview:{project_id}:{route}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The last good document of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPreview {
    pub html: String,
    pub content_hash: ContentHash,
    pub stored_at_ms: u64,
}

impl CachedPreview {
    pub fn new(html: impl Into<String>) -> Self {
        let html = html.into();
        Self {
            content_hash: ContentHash::of(&html),
            html,
            stored_at_ms: now_ms(),
        }
    }

    /// The document this entry was stored from.
    pub fn into_document(self, framework: Framework) -> CompiledDocument {
        CompiledDocument {
            html: self.html,
            content_hash: self.content_hash,
            compiled_at_ms: self.stored_at_ms,
            framework,
            compile_duration_ms: 0,
        }
    }
}

impl From<&CompiledDocument> for CachedPreview {
    fn from(doc: &CompiledDocument) -> Self {
        Self {
            html: doc.html.clone(),
            content_hash: doc.content_hash,
            stored_at_ms: now_ms(),
        }
    }
}

/// Shared, cloneable cache handle.
#[derive(Debug, Clone, Default)]
pub struct PreviewCache {
    entries: Arc<DashMap<SessionKey, CachedPreview>>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SessionKey) -> Option<CachedPreview> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Overwrite the entry for `key`.
    pub fn store(&self, key: SessionKey, preview: CachedPreview) {
        crate::debug!("cache"; "stored {} ({})", key, preview.content_hash);
        self.entries.insert(key, preview);
    }

    pub fn remove(&self, key: &SessionKey) -> Option<CachedPreview> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by key.
    pub fn snapshot(&self) -> Vec<(SessionKey, CachedPreview)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = (SessionKey, CachedPreview)>) {
        for (key, preview) in entries {
            self.entries.insert(key, preview);
        }
    }
}
