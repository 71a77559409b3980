//! Last-good-document cache.
//!
//! A preview remounted under the same session key paints from here with no
//! compile and no network. `watch` persists the cache to disk between runs.

mod persist;
mod preview;

/// Cache directory name (inside project root)
pub(crate) const CACHE_DIR: &str = ".instaview/cache";

pub use persist::{persist_cache, restore_cache};
pub use preview::{CachedPreview, PreviewCache, SessionKey};
