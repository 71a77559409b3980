//! Preview cache persistence.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{CACHE_DIR, CachedPreview, PreviewCache, SessionKey};

/// Cache file name
const PREVIEWS_FILE: &str = "previews.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedPreviews {
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntry {
    session_key: SessionKey,
    #[serde(flatten)]
    preview: CachedPreview,
}

/// Check if file content is the same as new content
fn file_content_matches(path: &Path, content: &str) -> bool {
    path.exists() && fs::read_to_string(path).is_ok_and(|existing| existing == content)
}

/// Persist the preview cache to disk
pub fn persist_cache(cache: &PreviewCache, root: &Path) -> std::io::Result<()> {
    let cache_dir = root.join(CACHE_DIR);
    let path = cache_dir.join(PREVIEWS_FILE);

    fs::create_dir_all(&cache_dir)?;

    let state = PersistedPreviews {
        entries: cache
            .snapshot()
            .into_iter()
            .map(|(session_key, preview)| PersistedEntry {
                session_key,
                preview,
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&state)?;

    if file_content_matches(&path, &json) {
        crate::debug!("persist"; "previews unchanged, skipping write");
        return Ok(());
    }

    fs::write(&path, &json)?;
    crate::debug!("persist"; "saved {} previews", state.entries.len());
    Ok(())
}

/// Restore persisted previews into `cache`; a missing file restores nothing.
pub fn restore_cache(cache: &PreviewCache, root: &Path) -> std::io::Result<usize> {
    let path = root.join(CACHE_DIR).join(PREVIEWS_FILE);

    if !path.exists() {
        return Ok(0);
    }

    let json = fs::read_to_string(&path)?;
    let state: PersistedPreviews = serde_json::from_str(&json)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let count = state.entries.len();
    cache.extend(state.entries.into_iter().map(|e| (e.session_key, e.preview)));

    crate::debug!("persist"; "restored {} previews", count);
    Ok(count)
}
