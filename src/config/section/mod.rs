//! Configuration section definitions.
//!
//! Each submodule corresponds to a section in `instaview.toml`.

mod engine;
mod serve;
mod sync;

pub use engine::EngineSection;
pub use serve::ServeSection;
pub use sync::{SyncSection, TOKEN_ENV, is_valid_id};
