//! Configuration management for `instaview.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── engine     # [engine]
//! │   ├── serve      # [serve]
//! │   └── sync       # [sync]
//! ├── util           # Upward config file search
//! └── mod.rs         # PreviewConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section    | Purpose                                          |
//! |------------|--------------------------------------------------|
//! | `[engine]` | Debounce, remote timeout, auth retries, hot reload |
//! | `[sync]`   | Remote compile authority for `watch --remote`    |
//! | `[serve]`  | Compile authority started by `instaview serve`   |
//!
//! Every field has a default, so a missing file is not an error. Precedence
//! is CLI flag > environment (`INSTAVIEW_TOKEN`) > file > default.

mod section;
mod util;

pub use section::{EngineSection, ServeSection, SyncSection, TOKEN_ENV, is_valid_id};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{Cli, Commands};
use crate::engine::EngineConfig;
use crate::log;
use crate::sync::ChannelConfig;
use util::find_config_file;

// ============================================================================
// errors
// ============================================================================

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing instaview.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Absolute path to the config file, empty when none was found
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory relative paths resolve against
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub serve: ServeSection,
}

impl PreviewConfig {
    /// Load configuration for `cli`.
    ///
    /// Searches upward from cwd for the config file, then applies the
    /// token environment variable and command-line overrides.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(PathBuf::from("."), e))?;

        let mut config = match find_config_file(&cwd, &cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
                config.config_path = path;
                config
            }
            None => {
                crate::debug!("config"; "{} not found, using defaults", cli.config.display());
                Self {
                    root: cwd,
                    ..Self::default()
                }
            }
        };

        config.sync.apply_token_override(std::env::var(TOKEN_ENV).ok());
        config.apply_command_options(&cli.command);
        config.finalize();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, command: &Commands) {
        match command {
            Commands::Watch { args } => {
                Self::update_option(&mut self.engine.debounce_ms, args.debounce.as_ref());
                Self::update_option(&mut self.engine.hot_reload, args.hot_reload.as_ref());
            }
            Commands::Serve {
                interface,
                port,
                ws_port,
                projects,
            } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.ws_port, ws_port.as_ref());
                Self::update_option(&mut self.serve.projects, projects.as_ref());
            }
            Commands::Compile { .. } | Commands::Detect { .. } => {}
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(target: &mut T, value: Option<&T>) {
        if let Some(v) = value {
            *target = v.clone();
        }
    }

    /// Resolve relative paths against the root.
    fn finalize(&mut self) {
        if self.serve.projects.is_relative() {
            self.serve.projects = self.root.join(&self.serve.projects);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.sync.validate()?;
        self.serve.validate()
    }

    // ========================================================================
    // derived settings
    // ========================================================================

    /// Engine settings for one mounted preview.
    pub fn engine_config(&self, project_id: &str) -> EngineConfig {
        EngineConfig {
            project_id: project_id.to_string(),
            route: None,
            debounce: self.engine.debounce(),
            remote_timeout: self.engine.remote_timeout(),
            hot_reload: self.engine.hot_reload,
        }
    }

    /// Room connection settings from `[sync]`.
    pub fn channel_config(&self) -> Result<ChannelConfig, ConfigError> {
        Ok(ChannelConfig {
            ws_url: self.sync.ws_url()?.to_string(),
            project_id: self.sync.project_id.clone(),
            user_id: self.sync.user_id.clone(),
            token: self.sync.token.clone(),
            max_auth_retries: self.engine.max_auth_retries,
        })
    }
}

// ============================================================================
// tests
// ============================================================================

/// Parse `content`, failing on unknown fields.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PreviewConfig {
    let (parsed, ignored) = PreviewConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
