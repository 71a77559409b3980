//! `[sync]` section configuration.
//!
//! Where `watch --remote` finds its compile authority.
//!
//! # Example
//!
//! ```toml
//! [sync]
//! server = "http://127.0.0.1:5280"   # HTTP surface
//! ws = "ws://127.0.0.1:5281"         # room protocol
//! project_id = "demo"
//! user_id = "local"
//! token = ""                          # INSTAVIEW_TOKEN overrides
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigError;

/// Environment variable that overrides `sync.token`.
pub const TOKEN_ENV: &str = "INSTAVIEW_TOKEN";

/// Remote compile authority settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub server: String,
    pub ws: String,
    pub project_id: String,
    pub user_id: String,
    pub token: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:5280".into(),
            ws: "ws://127.0.0.1:5281".into(),
            project_id: "demo".into(),
            user_id: "local".into(),
            token: String::new(),
        }
    }
}

impl SyncSection {
    /// HTTP base of the authority.
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        parse_url("sync.server", &self.server, &["http", "https"])
    }

    /// Real-time endpoint of the authority.
    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        parse_url("sync.ws", &self.ws, &["ws", "wss"])
    }

    /// Replace the token with a non-empty override.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.token = token;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_url()?;
        self.ws_url()?;
        if !is_valid_id(&self.project_id) {
            return Err(ConfigError::Validation(format!(
                "sync.project_id `{}` may only contain letters, digits, `-` and `_`",
                self.project_id
            )));
        }
        Ok(())
    }
}

/// Project ids are path and URL segments on the authority.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn parse_url(field: &str, value: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{field} `{value}` is not a URL: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Validation(format!(
            "{field} must use {}, got `{}`",
            schemes.join(" or "),
            url.scheme()
        )));
    }
    Ok(url)
}
