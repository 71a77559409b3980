//! Compile authority: HTTP surface plus the real-time room.
//!
//! ```text
//! tiny_http ──► rayon pool ──► handle_request ──┐
//!                                               ├──► ProjectStore (DashMap)
//! room threads (tungstenite) ───────────────────┘
//! ```
//!
//! Both surfaces share one store, so an edit over HTTP and an edit in the
//! room see each other. HTTP edits are mirrored into the room as pushes.

mod lifecycle;
mod response;
mod room;
mod routes;
mod store;

pub use room::RoomServer;
pub use store::{ProjectStore, StoreError, normalize_path};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel::Sender;
use tiny_http::{Request, Server};
use url::Url;

use crate::config::{PreviewConfig, is_valid_id};
use crate::error::CompileError;
use crate::sync::{DevServerResponse, FileUpdate, HtmlResponse, WireMessage};
use crate::{debug, log};
use room::Inbound;
use routes::Route;

/// Request-handling threads.
const WORKERS: usize = 4;

/// What every request handler needs.
struct ServeState {
    store: Arc<ProjectStore>,
    token: String,
    devserver: Option<Url>,
    room: Sender<Inbound>,
}

impl ServeState {
    /// No token configured, or `Authorization: Bearer <token>` matches.
    fn authorized(&self, request: &Request) -> bool {
        if self.token.is_empty() {
            return true;
        }
        request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Authorization"))
            .and_then(|h| h.value.as_str().strip_prefix("Bearer "))
            .is_some_and(|token| token == self.token)
    }
}

/// Bound authority ready to accept requests
pub struct Authority {
    server: Arc<Server>,
    http_addr: SocketAddr,
    room: RoomServer,
    state: Arc<ServeState>,
}

/// Bind both surfaces and seed the store.
pub fn bind(config: &PreviewConfig) -> Result<Authority> {
    let store = ProjectStore::seed(&config.serve.projects)
        .with_context(|| format!("Failed to read projects from {}", config.serve.projects.display()))?;
    log!("serve"; "{} project(s) from {}", store.len(), config.serve.projects.display());
    let store = Arc::new(store);

    let (server, http_addr) = lifecycle::bind_http(config.serve.interface, config.serve.port)?;
    let listener = lifecycle::bind_ws(config.serve.interface, config.serve.ws_port)?;
    let room = RoomServer::start(listener, Arc::clone(&store), config.serve.token.clone())?;

    let state = Arc::new(ServeState {
        store,
        token: config.serve.token.clone(),
        devserver: config.serve.devserver()?,
        room: room.sender(),
    });

    log!("serve"; "http://{}", http_addr);
    Ok(Authority {
        server: Arc::new(server),
        http_addr,
        room,
        state,
    })
}

impl Authority {
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn ws_addr(&self) -> SocketAddr {
        self.room.addr()
    }

    /// Handle for unblocking the request loop.
    pub fn server(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    /// Start the request loop (blocking) until the server is unblocked.
    pub fn run(self) -> Result<()> {
        crate::core::register_server(Arc::clone(&self.server));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(WORKERS)
            .thread_name(|i| format!("serve-{i}"))
            .build()
            .context("failed to create thread pool")?;

        for request in self.server.incoming_requests() {
            let state = Arc::clone(&self.state);
            pool.spawn(move || {
                if let Err(e) = handle_request(request, &state) {
                    log!("serve"; "request error: {e}");
                }
            });
        }

        self.room.stop();
        Ok(())
    }
}

/// Handle a single HTTP request
fn handle_request(mut request: Request, state: &ServeState) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let route = Route::parse(request.method(), request.url());
    debug!("serve"; "{} {}", request.method(), request.url());

    if route != Route::Health && !state.authorized(&request) {
        return response::send_error(request, 401, "missing or invalid token");
    }

    match route {
        Route::Health => response::send_text(request, 200, "ok"),
        Route::Snapshot(id) => match state.store.snapshot(&id) {
            Ok(doc) => response::send_html(request, doc.html),
            Err(e @ StoreError::UnknownProject(_)) => response::send_error(request, 404, e.to_string()),
            Err(e) => response::send_error(request, 400, e.to_string()),
        },
        Route::PutFile(id) => {
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body)?;
            let update: FileUpdate = match serde_json::from_str(&body) {
                Ok(update) => update,
                Err(e) => return response::send_error(request, 400, format!("invalid body: {e}")),
            };
            put_file(request, state, &id, update)
        }
        Route::StartDevServer(id) => {
            let Some(base) = &state.devserver else {
                return response::send_error(request, 501, "no dev server configured");
            };
            if !is_valid_id(&id) {
                return response::send_error(request, 400, format!("invalid project id `{id}`"));
            }
            let url = format!("{}/{}/", base.as_str().trim_end_matches('/'), id);
            response::send_json(request, 200, &DevServerResponse { url })
        }
        Route::MethodNotAllowed => response::send_error(request, 405, "method not allowed"),
        Route::NotFound => response::send_error(request, 404, "not found"),
    }
}

fn put_file(request: Request, state: &ServeState, id: &str, update: FileUpdate) -> Result<()> {
    match state.store.apply(id, &update.file_path, &update.content, false) {
        Ok(doc) => {
            let push = Inbound::Push {
                project_id: id.to_string(),
                message: WireMessage::PreviewUpdated {
                    seq: None,
                    html: doc.html.clone(),
                    file_path: Some(update.file_path),
                },
            };
            let _ = state.room.send(push);
            response::send_json(request, 200, &HtmlResponse { html: doc.html })
        }
        Err(StoreError::Compile(e)) => {
            let message = match e {
                CompileError::Source { message, .. } => message,
                other => other.to_string(),
            };
            response::send_error(request, 422, message)
        }
        Err(e) => response::send_error(request, 400, e.to_string()),
    }
}

/// `instaview serve`: run until Ctrl+C.
pub fn serve(config: &PreviewConfig) -> Result<()> {
    let authority = bind(config)?;
    log!("serve"; "authority ready, press Ctrl+C to stop");
    authority.run()
}
