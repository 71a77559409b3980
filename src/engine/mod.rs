//! Preview engine: one actor per mounted preview.
//!
//! ```text
//!  EngineHandle ──► commands ─┐
//!  RemoteLink   ──► events   ─┤
//!  HTTP tasks   ──► replies  ─┼──► Engine::run ──► PreviewFrame (sole writer)
//!  debounce deadline         ─┤         │
//!  remote deadline           ─┘         └──► PreviewCache
//! ```
//!
//! Every compile request, local or remote, is issued a sequence id and its
//! answer passes the [`SequenceGate`] before it may touch the frame. A new
//! edit never cancels an in-flight request; it issues a newer id, which
//! turns the old answer stale.
//!
//! Mount order: cached document (no network) → authority snapshot → local
//! compile.

mod frame;
mod messages;
mod scheduler;
mod session;
mod transport;

#[cfg(test)]
mod tests;

pub use frame::{FileFrame, PreviewFrame, Sandbox, external_document};
pub use messages::{EngineHandle, EngineMsg, EngineStopped, ExternalTarget};
pub use scheduler::{RenderScheduler, RenderState};
pub use session::{PreviewSession, RenderStats, SessionSnapshot};
pub use transport::TransportStrategy;

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use url::Url;

use crate::cache::{CachedPreview, PreviewCache};
use crate::compiler::{CompiledDocument, CompilerSet};
use crate::detect::detect;
use crate::error::{CompileError, ErrorPresenter, PreviewError};
use crate::sync::{Admission, ConnectionState, Seq, SequenceGate, SyncEvent, SyncMessage};
use crate::tree::FlatFileMap;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub project_id: String,
    /// Route inside the project, part of the cache key.
    pub route: Option<String>,
    pub debounce: Duration,
    /// How long a remote request may stay unanswered before compiling locally.
    pub remote_timeout: Duration,
    pub hot_reload: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_id: "local".to_string(),
            route: None,
            debounce: Duration::from_millis(300),
            remote_timeout: Duration::from_millis(4000),
            hot_reload: true,
        }
    }
}

/// Answer from a spawned network task.
enum Reply {
    Compiled {
        seq: Seq,
        result: Result<String, PreviewError>,
    },
    DevServer(Result<Url, PreviewError>),
}

/// Which way the outstanding request went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Room,
    Http,
}

/// The one remote request whose answer is awaited.
#[derive(Debug)]
struct InFlight {
    seq: Seq,
    route: Route,
    started: Instant,
    deadline: Instant,
}

pub struct Engine {
    rx: mpsc::Receiver<EngineMsg>,
    replies_tx: mpsc::UnboundedSender<Reply>,
    replies_rx: mpsc::UnboundedReceiver<Reply>,
    frame: Box<dyn PreviewFrame>,
    compilers: CompilerSet,
    cache: PreviewCache,
    transport: TransportStrategy,
    session: PreviewSession,
    scheduler: RenderScheduler,
    gate: SequenceGate,
    files: FlatFileMap,
    remote_timeout: Duration,
    in_flight: Option<InFlight>,
    /// Changes arrived while hot reload was off.
    pending: bool,
    /// The frame is not showing `session.last_document` as-is (error
    /// overlay, dev server), so the next result must repaint.
    frame_stale: bool,
    dev_sandbox: Sandbox,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        frame: Box<dyn PreviewFrame>,
        transport: TransportStrategy,
        cache: PreviewCache,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();

        let mut session = PreviewSession::new(
            &config.project_id,
            config.route.as_deref(),
            transport.initial_state(),
        );
        session.hot_reload_enabled = config.hot_reload;

        let engine = Self {
            rx,
            replies_tx,
            replies_rx,
            frame,
            compilers: CompilerSet::default(),
            cache,
            transport,
            session,
            scheduler: RenderScheduler::new(config.debounce),
            gate: SequenceGate::new(),
            files: FlatFileMap::new(),
            remote_timeout: config.remote_timeout,
            in_flight: None,
            pending: false,
            frame_stale: true,
            dev_sandbox: Sandbox::Strict,
        };
        (engine, EngineHandle::new(tx))
    }

    /// Project files present at mount.
    pub fn with_files(mut self, files: FlatFileMap) -> Self {
        self.files = files;
        self
    }

    /// Replace the compilers (for a custom template registry).
    pub fn with_compilers(mut self, compilers: CompilerSet) -> Self {
        self.compilers = compilers;
        self
    }

    /// Mount, then process events until shutdown. Returns the final session.
    pub async fn run(mut self) -> PreviewSession {
        self.mount();

        loop {
            let debounce = self.scheduler.deadline();
            let remote = self.in_flight.as_ref().map(|f| f.deadline);

            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(EngineMsg::Shutdown) | None => break,
                    Some(msg) => self.handle(msg),
                },
                event = self.transport.next_event() => self.on_sync_event(event),
                Some(reply) = self.replies_rx.recv() => self.on_reply(reply),
                () = sleep_until(debounce) => self.on_debounce(),
                () = sleep_until(remote) => self.on_remote_timeout(),
            }
        }

        crate::debug!("engine"; "session {} closed", self.session.session_key);
        self.session
    }

    // =========================================================================
    // Mount
    // =========================================================================

    fn mount(&mut self) {
        if let Some(cached) = self.cache.get(&self.session.session_key) {
            crate::debug!("engine"; "restored {} from cache", self.session.session_key);
            let doc = cached.into_document(detect(&self.files));
            self.accept(doc, Instant::now(), false);
            return;
        }

        self.scheduler.begin();
        match self.transport.authority() {
            Some(authority) => {
                let seq = self.gate.issue();
                let project_id = self.session.project_id.clone();
                crate::debug!("engine"; "fetching snapshot for {}", project_id);
                self.spawn_compile(seq, async move { authority.fetch_snapshot(&project_id).await });
                self.track(seq, Route::Http);
            }
            None => self.compile_local(),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn handle(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::FilesChanged(input) => {
                self.files = input.to_flat_map();
                if self.scheduler.state() == RenderState::Delegated {
                    return;
                }
                if !self.session.hot_reload_enabled {
                    self.pending = true;
                    return;
                }
                self.scheduler.file_changed(Instant::now());
            }
            EngineMsg::Refresh => self.refresh(),
            EngineMsg::Retry => {
                if self.scheduler.retry() {
                    crate::debug!("engine"; "retrying");
                    self.dispatch();
                } else {
                    self.refresh();
                }
            }
            EngineMsg::SetHotReload(enabled) => {
                self.session.hot_reload_enabled = enabled;
                if enabled && std::mem::take(&mut self.pending) {
                    self.scheduler.file_changed(Instant::now());
                }
            }
            EngineMsg::EnableDevServer(url) => self.delegate(url, Sandbox::Strict),
            EngineMsg::StartDevServer => self.request_dev_server(),
            EngineMsg::DisableDevServer => self.undelegate(),
            EngineMsg::OpenExternal(reply) => self.open_external(reply),
            EngineMsg::Inspect(reply) => {
                let _ = reply.send(SessionSnapshot {
                    session: self.session.clone(),
                    state: self.scheduler.state(),
                    in_flight: !self.gate.is_idle(),
                });
            }
            EngineMsg::Shutdown => {}
        }
    }

    fn refresh(&mut self) {
        if let Some(url) = self.session.dev_server.clone() {
            self.navigate(&url, self.dev_sandbox);
            return;
        }
        self.pending = false;
        self.scheduler.begin();
        self.dispatch();
    }

    fn on_debounce(&mut self) {
        if self.scheduler.fire(Instant::now()) {
            self.dispatch();
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// `None` means compile in-process.
    fn route(&self) -> Option<Route> {
        match (&self.transport, self.session.connection_state) {
            (TransportStrategy::Local, _) | (_, ConnectionState::ReconnectRequired) => None,
            (_, ConnectionState::Connected) => Some(Route::Room),
            _ => Some(Route::Http),
        }
    }

    fn dispatch(&mut self) {
        let route = self.route();
        if route == Some(Route::Room) {
            match self.send_room() {
                Ok(()) => return,
                Err(e) => crate::debug!("sync"; "room send failed ({}), using HTTP", e),
            }
        }
        match route {
            None => self.compile_local(),
            Some(_) => self.send_http(),
        }
    }

    fn send_room(&mut self) -> Result<(), PreviewError> {
        if let TransportStrategy::Remote(remote) = &mut self.transport {
            let seq = remote.send_room(&self.files, &mut self.gate)?;
            crate::debug!("sync"; "sent update seq={}", seq);
            self.track(seq, Route::Room);
        }
        Ok(())
    }

    fn send_http(&mut self) {
        if !self.transport.is_remote() {
            return self.compile_local();
        }
        let TransportStrategy::Remote(remote) = &mut self.transport else {
            return;
        };
        let request = remote.http_request(&self.session.project_id, &self.files);
        let seq = self.gate.issue();
        crate::debug!("sync"; "HTTP compile seq={} ({} upload(s))", seq, request.uploads());
        self.spawn_compile(seq, request.run());
        self.track(seq, Route::Http);
    }

    fn spawn_compile<F>(&self, seq: Seq, request: F)
    where
        F: Future<Output = Result<String, PreviewError>> + Send + 'static,
    {
        let tx = self.replies_tx.clone();
        tokio::spawn(async move {
            let result = request.await;
            let _ = tx.send(Reply::Compiled { seq, result });
        });
    }

    fn track(&mut self, seq: Seq, route: Route) {
        let now = Instant::now();
        self.session.stats.remote_requests += 1;
        self.in_flight = Some(InFlight {
            seq,
            route,
            started: now,
            deadline: now + self.remote_timeout,
        });
    }

    fn compile_local(&mut self) {
        let seq = self.gate.issue();
        self.in_flight = None;
        self.session.stats.local_compiles += 1;

        let started = Instant::now();
        let result = self.compilers.try_compile(&self.files);
        if let Admission::Stale { .. } = self.gate.admit(seq) {
            return;
        }
        match result {
            Ok(doc) => self.accept(doc, started, true),
            Err(e) => {
                self.fail(e.into());
                self.scheduler.failed();
            }
        }
    }

    // =========================================================================
    // Results
    // =========================================================================

    fn on_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Compiled { seq, result } => self.on_remote_result(seq, result),
            Reply::DevServer(Ok(url)) => self.delegate(url, Sandbox::Relaxed),
            Reply::DevServer(Err(e)) => crate::log!("engine"; "dev server unavailable: {}", e),
        }
    }

    fn on_remote_result(&mut self, seq: Seq, result: Result<String, PreviewError>) {
        if let Admission::Stale { .. } = self.gate.admit(seq) {
            self.session.stats.stale_discards += 1;
            return;
        }
        let started = self
            .in_flight
            .take()
            .map_or_else(Instant::now, |flight| flight.started);

        match result {
            Ok(html) => {
                let elapsed = started.elapsed().as_millis() as u64;
                let doc = CompiledDocument::new(html, detect(&self.files), elapsed);
                self.accept(doc, started, true);
            }
            Err(e) if e.is_recoverable_locally() => {
                crate::log!("sync"; "{}, compiling locally", e);
                if let TransportStrategy::Remote(remote) = &mut self.transport {
                    remote.reset_baseline();
                }
                self.compile_local();
            }
            Err(e) => {
                self.fail(e);
                self.scheduler.failed();
            }
        }
    }

    fn on_remote_timeout(&mut self) {
        let Some(flight) = self.in_flight.take() else {
            return;
        };
        crate::log!("sync"; "no answer to seq={} within {}ms", flight.seq, self.remote_timeout.as_millis());
        if let TransportStrategy::Remote(remote) = &mut self.transport {
            remote.reset_baseline();
        }
        if self.scheduler.state() == RenderState::Scheduled {
            // a newer request follows shortly anyway
            self.gate.supersede();
        } else {
            self.compile_local();
        }
    }

    /// Paint `doc` unless the frame already shows it.
    ///
    /// `requested` is false for documents nobody here asked for (cache
    /// restore, room pushes); those never move a pending compile along.
    fn accept(&mut self, doc: CompiledDocument, started: Instant, requested: bool) {
        self.session.last_error = None;

        let unchanged = !self.frame_stale
            && self
                .session
                .last_document
                .as_ref()
                .is_some_and(|last| last.content_hash == doc.content_hash);
        if unchanged {
            crate::debug!("engine"; "unchanged {}, not repainting", doc.content_hash);
            self.session.stats.skips += 1;
            self.frame.unchanged();
            if requested {
                self.scheduler.skipped();
            }
            return;
        }

        if let Err(e) = self.frame.paint(&doc.html) {
            crate::log!("engine"; "paint failed: {}", e);
            if requested {
                self.scheduler.failed();
            }
            return;
        }
        self.frame_stale = false;

        let latency = started.elapsed();
        self.session.stats.record_paint(latency);
        crate::debug!("engine"; "painted {} ({}) in {}ms", doc.content_hash, doc.framework, latency.as_millis());

        self.cache
            .store(self.session.session_key.clone(), CachedPreview::from(&doc));
        self.session.last_document = Some(doc);

        if requested {
            self.scheduler.succeeded();
        } else {
            self.scheduler.adopt();
        }
    }

    /// Surface `error` over the last good paint.
    fn fail(&mut self, error: PreviewError) {
        crate::log!("engine"; "{}", error);
        let view = ErrorPresenter::present(&error);
        if let Err(e) = self.frame.show_error(&view, self.session.last_html()) {
            crate::log!("engine"; "error view failed: {}", e);
        }
        self.frame_stale = true;
        self.session.stats.failures += 1;
        self.session.last_error = Some(error);
    }

    // =========================================================================
    // Sync events
    // =========================================================================

    fn on_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Joined => {
                crate::log!("sync"; "joined room {}", self.session.project_id);
                if let TransportStrategy::Remote(remote) = &mut self.transport {
                    remote.reset_baseline();
                }
                self.set_connection(ConnectionState::Connected);
            }
            SyncEvent::Disconnected(e) => {
                if self.session.connection_state == ConnectionState::ReconnectRequired {
                    return;
                }
                if self.session.connection_state == ConnectionState::Connected {
                    crate::log!("sync"; "offline: {}", e);
                }
                self.set_connection(ConnectionState::Disconnected);
                // the room will not answer what it was sent
                if self.awaiting(Route::Room) {
                    if let TransportStrategy::Remote(remote) = &mut self.transport {
                        remote.reset_baseline();
                    }
                    self.send_http();
                }
            }
            SyncEvent::Rejected { reason, attempt } => {
                crate::debug!("sync"; "join rejected (attempt {}): {}", attempt, reason);
            }
            SyncEvent::GaveUp(e) => {
                self.set_connection(ConnectionState::ReconnectRequired);
                self.fail(e.into());
                if self.awaiting(Route::Room) {
                    self.compile_local();
                }
            }
            SyncEvent::Message(msg) => self.on_sync_message(msg),
        }
    }

    fn on_sync_message(&mut self, msg: SyncMessage) {
        match msg {
            SyncMessage::DocumentReady {
                seq: Some(seq),
                html,
                ..
            } => self.on_remote_result(seq, Ok(html)),
            SyncMessage::CompileFailed {
                seq: Some(seq),
                error,
                path,
            } => self.on_remote_result(seq, Err(remote_error(error, path).into())),
            SyncMessage::DocumentReady {
                seq: None, html, ..
            } => {
                if !self.accepts_push() {
                    crate::debug!("sync"; "ignoring room push while a request is pending");
                    return;
                }
                let doc = CompiledDocument::new(html, detect(&self.files), 0);
                self.accept(doc, Instant::now(), false);
            }
            SyncMessage::CompileFailed {
                seq: None,
                error,
                path,
            } => {
                if self.accepts_push() {
                    self.fail(remote_error(error, path).into());
                }
            }
            SyncMessage::FileUpdated { .. } | SyncMessage::RefreshRequested { .. } => {
                crate::debug!("sync"; "ignoring request frame from server");
            }
        }
    }

    /// Unsolicited documents apply only when nothing is pending locally.
    fn accepts_push(&self) -> bool {
        self.gate.is_idle()
            && matches!(
                self.scheduler.state(),
                RenderState::Idle | RenderState::Rendered | RenderState::Failed
            )
    }

    fn awaiting(&self, route: Route) -> bool {
        self.in_flight.as_ref().is_some_and(|f| f.route == route)
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if self.session.connection_state != state {
            crate::debug!("sync"; "connection: {:?}", state);
            self.session.connection_state = state;
            self.frame.connection_changed(state);
        }
    }

    // =========================================================================
    // Dev server
    // =========================================================================

    fn request_dev_server(&mut self) {
        let Some(authority) = self.transport.authority() else {
            crate::log!("engine"; "no compile authority to start a dev server");
            return;
        };
        let project_id = self.session.project_id.clone();
        let tx = self.replies_tx.clone();
        tokio::spawn(async move {
            let result = authority.start_dev_server(&project_id).await;
            let _ = tx.send(Reply::DevServer(result));
        });
    }

    fn delegate(&mut self, url: Url, sandbox: Sandbox) {
        self.scheduler.delegate();
        self.in_flight = None;
        self.gate.supersede();
        crate::log!("engine"; "showing dev server {}", url);
        self.navigate(&url, sandbox);
        self.session.dev_server = Some(url);
        self.dev_sandbox = sandbox;
    }

    fn navigate(&mut self, url: &Url, sandbox: Sandbox) {
        if let Err(e) = self.frame.navigate(url, sandbox) {
            crate::log!("engine"; "navigate failed: {}", e);
        }
        self.frame_stale = true;
    }

    fn undelegate(&mut self) {
        if self.session.dev_server.take().is_none() {
            return;
        }
        self.scheduler.undelegate();
        self.scheduler.begin();
        self.dispatch();
    }

    fn open_external(&mut self, reply: oneshot::Sender<ExternalTarget>) {
        if let Some(url) = &self.session.dev_server {
            let _ = reply.send(ExternalTarget::DevServer(url.clone()));
            return;
        }
        let document = match self.session.last_html() {
            Some(html) => html.to_string(),
            None => self.compilers.compile(&self.files).html,
        };
        let Some(authority) = self.transport.authority() else {
            let _ = reply.send(ExternalTarget::Document(document));
            return;
        };
        let project_id = self.session.project_id.clone();
        tokio::spawn(async move {
            let target = match authority.start_dev_server(&project_id).await {
                Ok(url) => ExternalTarget::DevServer(url),
                Err(e) => {
                    crate::debug!("engine"; "dev server unavailable ({}), exporting document", e);
                    ExternalTarget::Document(document)
                }
            };
            let _ = reply.send(target);
        });
    }
}

fn remote_error(error: String, path: Option<String>) -> CompileError {
    match path {
        Some(path) => CompileError::Source {
            path,
            message: error,
        },
        None => CompileError::Remote(error),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
