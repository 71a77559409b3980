//! Server lifecycle management.

use std::net::{IpAddr, SocketAddr, TcpListener};

use anyhow::{Result, anyhow};
use tiny_http::Server;

use crate::log;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind the HTTP server, trying the next ports when one is taken.
///
/// Port 0 binds an ephemeral port. Returns the address actually bound.
pub fn bind_http(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    bind_with_retry(interface, base_port, "serve", |addr| {
        let server = Server::http(addr).map_err(|e| anyhow!("{e}"))?;
        let bound = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("server is not bound to an IP address"))?;
        Ok((server, bound))
    })
}

/// Bind the room listener the same way.
pub fn bind_ws(interface: IpAddr, base_port: u16) -> Result<TcpListener> {
    bind_with_retry(interface, base_port, "room", |addr| Ok(TcpListener::bind(addr)?))
}

fn bind_with_retry<T>(
    interface: IpAddr,
    base_port: u16,
    module: &str,
    mut bind: impl FnMut(SocketAddr) -> Result<T>,
) -> Result<T> {
    let attempts = if base_port == 0 { 1 } else { MAX_PORT_RETRIES };
    let mut last_error = None;

    for offset in 0..attempts {
        let port = base_port.saturating_add(offset);
        match bind(SocketAddr::new(interface, port)) {
            Ok(bound) => {
                if offset > 0 {
                    log!(module; "port {} in use, using {} instead", base_port, port);
                }
                return Ok(bound);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        attempts,
        base_port,
        base_port.saturating_add(attempts - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
