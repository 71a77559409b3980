//! `[serve]` section configuration.
//!
//! Settings of the compile authority started by `instaview serve`.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 5280                 # HTTP port number
//! ws_port = 5281              # Room protocol port number
//! projects = "projects"       # One sub-directory per project id
//! token = ""                  # Non-empty: clients must present exactly this
//! devserver_url = ""          # Non-empty: base of per-project dev servers
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigError;

/// Compile authority settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    /// Network interface to bind.
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// WebSocket port number.
    pub ws_port: u16,

    /// Projects directory (relative to the config file).
    pub projects: PathBuf,

    pub token: String,

    pub devserver_url: String,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5280,
            ws_port: 5281,
            projects: PathBuf::from("projects"),
            token: String::new(),
            devserver_url: String::new(),
        }
    }
}

impl ServeSection {
    pub const fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.interface, self.port)
    }

    pub const fn ws_addr(&self) -> SocketAddr {
        SocketAddr::new(self.interface, self.ws_port)
    }

    /// Dev server base, if configured.
    pub fn devserver(&self) -> Result<Option<Url>, ConfigError> {
        if self.devserver_url.is_empty() {
            return Ok(None);
        }
        Url::parse(&self.devserver_url)
            .map(Some)
            .map_err(|e| ConfigError::Validation(format!("serve.devserver_url: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port != 0 && self.port == self.ws_port {
            return Err(ConfigError::Validation(format!(
                "serve.port and serve.ws_port are both {}",
                self.port
            )));
        }
        self.devserver()?;
        Ok(())
    }
}
