//! Shutdown tracking for `serve` and `watch`.
//!
//! Ctrl+C sets `SHUTDOWN`, then wakes whatever is registered:
//! - the HTTP server (`serve`), which is unblocked
//! - a listener channel (`watch`), which forwards to the engine
//!
//! With nothing registered the process exits right away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::channel::Sender;
use tiny_http::Server;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Shutdown signal sender for the preview engine
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(on_interrupt).map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

fn on_interrupt() {
    SHUTDOWN.store(true, Ordering::SeqCst);

    let mut graceful = false;
    if let Some(tx) = SHUTDOWN_TX.get() {
        graceful |= tx.send(()).is_ok();
    }
    if let Some(server) = SERVER.get() {
        crate::log!("serve"; "shutting down...");
        server.unblock();
        graceful = true;
    }

    if !graceful {
        std::process::exit(0);
    }
}

/// Register the HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>) {
    let _ = SERVER.set(server);
}

/// Register a channel that receives one `()` on Ctrl+C.
pub fn register_shutdown_listener(tx: Sender<()>) {
    let _ = SHUTDOWN_TX.set(tx);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
