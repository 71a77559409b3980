use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use url::Url;

use super::*;
use crate::cache::SessionKey;
use crate::error::{AuthError, CompileError, ErrorKind, ErrorView, TransportError};
use crate::sync::{CompileAuthority, RemoteEnd, RemoteLink};
use crate::tree::{EditorInput, FileNode};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Paint(String),
    Navigate(Url, Sandbox),
    Error {
        kind: ErrorKind,
        last_good: Option<String>,
    },
    Unchanged,
    Connection(ConnectionState),
}

/// Frame that records what the engine did to it.
#[derive(Clone, Default)]
struct Recording(Arc<Mutex<Vec<Op>>>);

impl Recording {
    fn ops(&self) -> Vec<Op> {
        self.0.lock().clone()
    }

    fn paints(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Paint(html) => Some(html),
                _ => None,
            })
            .collect()
    }

    fn last_paint(&self) -> String {
        self.paints().pop().unwrap_or_default()
    }

    fn last_op(&self) -> Option<Op> {
        self.ops().pop()
    }
}

impl PreviewFrame for Recording {
    fn paint(&mut self, html: &str) -> std::io::Result<()> {
        self.0.lock().push(Op::Paint(html.to_string()));
        Ok(())
    }

    fn navigate(&mut self, url: &Url, sandbox: Sandbox) -> std::io::Result<()> {
        self.0.lock().push(Op::Navigate(url.clone(), sandbox));
        Ok(())
    }

    fn show_error(&mut self, view: &ErrorView, last_good: Option<&str>) -> std::io::Result<()> {
        self.0.lock().push(Op::Error {
            kind: view.kind,
            last_good: last_good.map(str::to_string),
        });
        Ok(())
    }

    fn unchanged(&mut self) {
        self.0.lock().push(Op::Unchanged);
    }

    fn connection_changed(&mut self, state: ConnectionState) {
        self.0.lock().push(Op::Connection(state));
    }
}

/// Compile authority that answers from memory and counts calls.
#[derive(Default)]
struct FakeAuthority {
    calls: AtomicUsize,
    puts: Mutex<Vec<(String, String)>>,
    snapshot: Option<String>,
    dev_server: Option<Url>,
}

impl FakeAuthority {
    fn with_snapshot(html: &str) -> Self {
        Self {
            snapshot: Some(html.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompileAuthority for FakeAuthority {
    async fn fetch_snapshot(&self, _project_id: &str) -> Result<String, PreviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshot.clone().ok_or_else(|| {
            TransportError::Http {
                status: 404,
                body: "no snapshot".into(),
            }
            .into()
        })
    }

    async fn put_file(&self, _project_id: &str, path: &str, content: &str) -> Result<String, PreviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.puts.lock().push((path.to_string(), content.to_string()));
        if content.contains("{oops") {
            return Err(CompileError::Remote(format!("unterminated expression in {path}")).into());
        }
        Ok(format!("<p>http {}</p>", content.len()))
    }

    async fn start_dev_server(&self, _project_id: &str) -> Result<Url, PreviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dev_server
            .clone()
            .ok_or_else(|| TransportError::Connect("no dev server".into()).into())
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        project_id: "demo".into(),
        ..EngineConfig::default()
    }
}

fn page(body: &str) -> EditorInput {
    EditorInput::new(vec![FileNode::file(
        "index.html",
        format!("<html><body>{body}</body></html>"),
    )])
}

/// Let spawned tasks and the engine drain their queues.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Wait out the debounce window.
async fn debounce() {
    sleep(Duration::from_millis(301)).await;
}

struct LocalEngine {
    handle: EngineHandle,
    frame: Recording,
    task: JoinHandle<PreviewSession>,
}

fn spawn_local(input: EditorInput) -> LocalEngine {
    let frame = Recording::default();
    let (engine, handle) = Engine::new(
        config(),
        Box::new(frame.clone()),
        TransportStrategy::local(),
        PreviewCache::new(),
    );
    let task = tokio::spawn(engine.with_files(input.to_flat_map()).run());
    LocalEngine {
        handle,
        frame,
        task,
    }
}

struct RemoteEngine {
    handle: EngineHandle,
    frame: Recording,
    end: RemoteEnd,
    authority: Arc<FakeAuthority>,
}

impl RemoteEngine {
    async fn join(&self) {
        self.end.events.send(SyncEvent::Joined).unwrap();
        settle().await;
    }

    async fn answer(&self, seq: Seq, html: &str) {
        self.end
            .events
            .send(SyncEvent::Message(SyncMessage::DocumentReady {
                seq: Some(seq),
                html: html.to_string(),
                path: None,
            }))
            .unwrap();
        settle().await;
    }

    /// Seq of the next file update the engine sent.
    async fn next_update(&mut self) -> Seq {
        match self.end.outgoing.recv().await {
            Some(SyncMessage::FileUpdated { seq, .. }) => seq,
            other => panic!("expected a file update, got {other:?}"),
        }
    }
}

fn spawn_remote(authority: FakeAuthority, cache: PreviewCache) -> RemoteEngine {
    let frame = Recording::default();
    let (link, end) = RemoteLink::pair();
    let authority = Arc::new(authority);
    let (engine, handle) = Engine::new(
        config(),
        Box::new(frame.clone()),
        TransportStrategy::remote(link, authority.clone()),
        cache,
    );
    tokio::spawn(engine.run());
    RemoteEngine {
        handle,
        frame,
        end,
        authority,
    }
}

async fn stats(handle: &EngineHandle) -> RenderStats {
    handle.inspect().await.unwrap().session.stats
}

// =============================================================================
// Local transport
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_mount_compiles_locally() {
    let engine = spawn_local(page("<h1>Hi</h1>"));
    let snap = engine.handle.inspect().await.unwrap();

    assert_eq!(snap.state, RenderState::Rendered);
    assert_eq!(snap.session.connection_state, ConnectionState::Local);
    assert_eq!(snap.session.stats.local_compiles, 1);
    assert_eq!(snap.session.stats.paints, 1);
    assert!(engine.frame.last_paint().contains("<h1>Hi</h1>"));
    assert!(snap.session.last_document.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_rapid_changes_coalesce_into_one_compile() {
    let engine = spawn_local(page("start"));
    let before = stats(&engine.handle).await.local_compiles;

    engine.handle.files_changed(page("first")).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    engine.handle.files_changed(page("second")).await.unwrap();

    // 299ms after the second change the window is still open
    sleep(Duration::from_millis(299)).await;
    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Scheduled);
    assert_eq!(snap.session.stats.local_compiles, before);

    sleep(Duration::from_millis(10)).await;
    assert_eq!(stats(&engine.handle).await.local_compiles, before + 1);
    assert!(engine.frame.last_paint().contains("second"));
    assert!(!engine.frame.paints().iter().any(|p| p.contains("first")));
}

#[tokio::test(start_paused = true)]
async fn test_equal_output_is_not_repainted() {
    let engine = spawn_local(page("same"));
    engine.handle.files_changed(page("same")).await.unwrap();
    debounce().await;

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.session.stats.local_compiles, 2);
    assert_eq!(snap.session.stats.paints, 1);
    assert_eq!(snap.session.stats.skips, 1);
    assert_eq!(snap.state, RenderState::Idle);
    assert_eq!(engine.frame.last_op(), Some(Op::Unchanged));
}

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_last_good_paint_and_retry() {
    let next = |src: &str| EditorInput::new(vec![FileNode::dir("app", vec![FileNode::file("page.tsx", src)])]);
    let engine = spawn_local(next("export default function Home(){return (<h1>Good</h1>)}"));
    engine.handle.inspect().await.unwrap();
    assert!(engine.frame.last_paint().contains("<h1>Good</h1>"));

    engine
        .handle
        .files_changed(next("export default function F(){ return (<p>{open</p>)"))
        .await
        .unwrap();
    debounce().await;

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Failed);
    assert_eq!(snap.session.stats.failures, 1);
    assert!(snap.session.last_error.is_some());
    match engine.frame.last_op() {
        Some(Op::Error { kind, last_good }) => {
            assert_eq!(kind, ErrorKind::Compile);
            assert!(last_good.unwrap().contains("<h1>Good</h1>"));
        }
        other => panic!("expected an error view, got {other:?}"),
    }

    // retrying the same broken source fails again without blanking
    engine.handle.retry().await.unwrap();
    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Failed);
    assert_eq!(snap.session.stats.failures, 2);

    engine
        .handle
        .files_changed(next("export default function Home(){return (<h1>Fixed</h1>)}"))
        .await
        .unwrap();
    debounce().await;

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Rendered);
    assert!(snap.session.last_error.is_none());
    assert!(engine.frame.last_paint().contains("<h1>Fixed</h1>"));
}

#[tokio::test(start_paused = true)]
async fn test_error_overlay_is_cleared_by_identical_document() {
    let next = |src: &str| EditorInput::new(vec![FileNode::dir("app", vec![FileNode::file("page.tsx", src)])]);
    let good = "export default function Home(){return (<h1>Good</h1>)}";
    let engine = spawn_local(next(good));

    engine
        .handle
        .files_changed(next("export default function F(){ return (<p>{open</p>)"))
        .await
        .unwrap();
    debounce().await;

    // same document as before the failure: must still repaint over the banner
    engine.handle.files_changed(next(good)).await.unwrap();
    debounce().await;

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.session.stats.paints, 2);
    assert_eq!(snap.session.stats.skips, 0);
    assert!(matches!(engine.frame.last_op(), Some(Op::Paint(_))));
}

#[tokio::test(start_paused = true)]
async fn test_hot_reload_off_waits_for_refresh() {
    let engine = spawn_local(page("v1"));
    engine.handle.set_hot_reload(false).await.unwrap();
    engine.handle.files_changed(page("v2")).await.unwrap();
    sleep(Duration::from_secs(2)).await;

    let snap = engine.handle.inspect().await.unwrap();
    assert!(!snap.session.hot_reload_enabled);
    assert_eq!(snap.session.stats.local_compiles, 1);

    // refresh bypasses the debounce window
    engine.handle.refresh().await.unwrap();
    assert_eq!(stats(&engine.handle).await.local_compiles, 2);
    assert!(engine.frame.last_paint().contains("v2"));
}

#[tokio::test(start_paused = true)]
async fn test_enabling_hot_reload_compiles_pending_changes() {
    let engine = spawn_local(page("v1"));
    engine.handle.set_hot_reload(false).await.unwrap();
    engine.handle.files_changed(page("v2")).await.unwrap();
    engine.handle.set_hot_reload(true).await.unwrap();
    debounce().await;

    assert!(engine.frame.last_paint().contains("v2"));
}

#[tokio::test(start_paused = true)]
async fn test_dev_server_suspends_local_scheduling() {
    let engine = spawn_local(page("v1"));
    let url = Url::parse("http://localhost:3000/").unwrap();
    engine.handle.enable_dev_server(url.clone()).await.unwrap();

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Delegated);
    assert_eq!(snap.session.dev_server.as_ref(), Some(&url));
    assert_eq!(engine.frame.last_op(), Some(Op::Navigate(url, Sandbox::Strict)));

    engine.handle.files_changed(page("v1")).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(stats(&engine.handle).await.local_compiles, 1);

    // back to painted documents, even though the content did not change
    engine.handle.disable_dev_server().await.unwrap();
    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Rendered);
    assert_eq!(snap.session.stats.paints, 2);
    assert!(snap.session.dev_server.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_open_external_exports_document_locally() {
    let engine = spawn_local(page("<h1>Export me</h1>"));
    match engine.handle.open_external().await.unwrap() {
        ExternalTarget::Document(html) => assert!(html.contains("Export me")),
        other => panic!("unexpected target {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_returns_session() {
    let engine = spawn_local(page("bye"));
    engine.handle.shutdown().await.unwrap();
    let session = engine.task.await.unwrap();
    assert_eq!(session.stats.paints, 1);
    assert!(engine.handle.refresh().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_paint_writes_cache() {
    let cache = PreviewCache::new();
    let frame = Recording::default();
    let (engine, handle) = Engine::new(
        config(),
        Box::new(frame),
        TransportStrategy::local(),
        cache.clone(),
    );
    tokio::spawn(engine.with_files(page("cached later").to_flat_map()).run());
    handle.inspect().await.unwrap();

    let entry = cache.get(&SessionKey::new("demo")).unwrap();
    assert!(entry.html.contains("cached later"));
}

// =============================================================================
// Remote transport
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cache_restore_makes_no_network_calls() {
    let cache = PreviewCache::new();
    cache.store(SessionKey::new("demo"), CachedPreview::new("<p>cached</p>"));

    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), cache);
    let snap = engine.handle.inspect().await.unwrap();
    settle().await;

    assert_eq!(engine.frame.paints(), vec!["<p>cached</p>".to_string()]);
    assert_eq!(snap.state, RenderState::Rendered);
    assert_eq!(snap.session.stats.remote_requests, 0);
    assert_eq!(engine.authority.calls(), 0);
    assert!(engine.end.outgoing.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_mount_paints_server_snapshot() {
    let engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;

    assert_eq!(engine.frame.paints(), vec!["<p>snap</p>".to_string()]);
    assert_eq!(engine.authority.calls(), 1);
    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Rendered);
    assert_eq!(snap.session.stats.local_compiles, 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_snapshot_falls_back_to_local_compile() {
    let engine = spawn_remote(FakeAuthority::default(), PreviewCache::new());
    settle().await;

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.session.stats.local_compiles, 1);
    assert_eq!(snap.session.stats.paints, 1);
}

#[tokio::test(start_paused = true)]
async fn test_room_round_trip() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine.join().await;
    assert_eq!(
        engine.handle.inspect().await.unwrap().session.connection_state,
        ConnectionState::Connected
    );

    engine.handle.files_changed(page("A")).await.unwrap();
    debounce().await;
    let seq = engine.next_update().await;
    assert!(engine.handle.inspect().await.unwrap().in_flight);

    engine.answer(seq, "<p>room A</p>").await;
    assert_eq!(engine.frame.last_paint(), "<p>room A</p>");
    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Rendered);
    assert!(!snap.in_flight);
}

#[tokio::test(start_paused = true)]
async fn test_stale_response_is_discarded() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine.join().await;

    engine.handle.files_changed(page("A")).await.unwrap();
    debounce().await;
    let first = engine.next_update().await;

    engine.handle.files_changed(page("B")).await.unwrap();
    debounce().await;
    let second = engine.next_update().await;
    assert!(second > first);

    engine.answer(second, "<p>B</p>").await;
    engine.answer(first, "<p>A</p>").await;

    assert_eq!(engine.frame.last_paint(), "<p>B</p>");
    assert!(!engine.frame.paints().contains(&"<p>A</p>".to_string()));
    assert_eq!(stats(&engine.handle).await.stale_discards, 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_timeout_compiles_locally() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine.join().await;

    engine.handle.files_changed(page("slow")).await.unwrap();
    debounce().await;
    let seq = engine.next_update().await;

    sleep(Duration::from_millis(4100)).await;
    assert_eq!(stats(&engine.handle).await.local_compiles, 1);
    assert!(engine.frame.last_paint().contains("slow"));

    // the late answer no longer applies
    engine.answer(seq, "<p>late</p>").await;
    assert!(engine.frame.last_paint().contains("slow"));
    assert_eq!(stats(&engine.handle).await.stale_discards, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_uses_http_fallback() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine.join().await;

    engine
        .end
        .events
        .send(SyncEvent::Disconnected(TransportError::Closed))
        .unwrap();
    settle().await;
    assert_eq!(
        engine.handle.inspect().await.unwrap().session.connection_state,
        ConnectionState::Disconnected
    );
    assert!(engine.frame.ops().contains(&Op::Connection(ConnectionState::Disconnected)));

    let input = page("offline edit");
    let content = input.to_flat_map().get("index.html").unwrap().to_string();
    engine.handle.files_changed(input).await.unwrap();
    debounce().await;
    settle().await;

    assert_eq!(
        engine.authority.puts.lock().clone(),
        vec![("index.html".to_string(), content.clone())]
    );
    assert_eq!(engine.frame.last_paint(), format!("<p>http {}</p>", content.len()));
    assert!(engine.end.outgoing.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_http_compile_error_still_uploads_later_files() {
    let engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine
        .end
        .events
        .send(SyncEvent::Disconnected(TransportError::Closed))
        .unwrap();
    settle().await;

    let project = |app: &str| {
        EditorInput::new(vec![
            FileNode::file("App.tsx", app.to_string()),
            FileNode::file("styles.css", "body { color: red }"),
        ])
    };
    engine.handle.files_changed(project("<div>{oops</div>")).await.unwrap();
    debounce().await;
    settle().await;

    let uploaded: Vec<String> = engine.authority.puts.lock().iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(uploaded, vec!["App.tsx", "styles.css"]);

    engine.handle.files_changed(project("<div>fixed</div>")).await.unwrap();
    debounce().await;
    settle().await;

    let puts = engine.authority.puts.lock().clone();
    assert_eq!(puts.len(), 3);
    assert_eq!(puts[2], ("App.tsx".to_string(), "<div>fixed</div>".to_string()));
    assert_eq!(
        engine.frame.last_paint(),
        format!("<p>http {}</p>", "<div>fixed</div>".len())
    );
    assert_eq!(
        engine.handle.inspect().await.unwrap().state,
        RenderState::Rendered
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_reroutes_pending_room_request() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine.join().await;

    engine.handle.files_changed(page("mid-flight")).await.unwrap();
    debounce().await;
    engine.next_update().await;

    engine
        .end
        .events
        .send(SyncEvent::Disconnected(TransportError::Closed))
        .unwrap();
    settle().await;

    assert_eq!(engine.authority.puts.lock().len(), 1);
    assert!(engine.frame.last_paint().starts_with("<p>http "));
    assert!(!engine.handle.inspect().await.unwrap().in_flight);
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_push_applies_only_when_idle() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine.join().await;

    let push = |html: &str| {
        SyncEvent::Message(SyncMessage::DocumentReady {
            seq: None,
            html: html.to_string(),
            path: Some("index.html".into()),
        })
    };

    engine.end.events.send(push("<p>from a teammate</p>")).unwrap();
    settle().await;
    assert_eq!(engine.frame.last_paint(), "<p>from a teammate</p>");

    engine.handle.files_changed(page("mine")).await.unwrap();
    debounce().await;
    engine.next_update().await;

    engine.end.events.send(push("<p>ignored</p>")).unwrap();
    settle().await;
    assert_eq!(engine.frame.last_paint(), "<p>from a teammate</p>");
}

#[tokio::test(start_paused = true)]
async fn test_remote_compile_error_keeps_last_paint() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    engine.join().await;

    engine.handle.files_changed(page("bad")).await.unwrap();
    debounce().await;
    let seq = engine.next_update().await;
    engine
        .end
        .events
        .send(SyncEvent::Message(SyncMessage::CompileFailed {
            seq: Some(seq),
            error: "unexpected token".into(),
            path: Some("index.html".into()),
        }))
        .unwrap();
    settle().await;

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.state, RenderState::Failed);
    assert_eq!(
        snap.session.last_error,
        Some(PreviewError::Compile(CompileError::Source {
            path: "index.html".into(),
            message: "unexpected token".into()
        }))
    );
    assert_eq!(
        engine.frame.last_op(),
        Some(Op::Error {
            kind: ErrorKind::Compile,
            last_good: Some("<p>snap</p>".into())
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_auth_give_up_switches_to_local_compiles() {
    let mut engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;

    engine
        .end
        .events
        .send(SyncEvent::GaveUp(AuthError::RetriesExhausted(3)))
        .unwrap();
    settle().await;

    let snap = engine.handle.inspect().await.unwrap();
    assert_eq!(snap.session.connection_state, ConnectionState::ReconnectRequired);
    assert!(engine.frame.ops().iter().any(|op| matches!(
        op,
        Op::Error {
            kind: ErrorKind::ReconnectRequired,
            ..
        }
    )));

    engine.handle.files_changed(page("local now")).await.unwrap();
    debounce().await;
    assert_eq!(stats(&engine.handle).await.local_compiles, 1);
    assert!(engine.frame.last_paint().contains("local now"));
    assert!(engine.end.outgoing.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_start_dev_server_relaxes_sandbox() {
    let url = Url::parse("http://127.0.0.1:3000/demo/").unwrap();
    let engine = spawn_remote(
        FakeAuthority {
            dev_server: Some(url.clone()),
            ..FakeAuthority::with_snapshot("<p>snap</p>")
        },
        PreviewCache::new(),
    );
    settle().await;

    engine.handle.start_dev_server().await.unwrap();
    settle().await;

    assert_eq!(engine.frame.last_op(), Some(Op::Navigate(url.clone(), Sandbox::Relaxed)));
    assert_eq!(engine.handle.inspect().await.unwrap().state, RenderState::Delegated);
    assert_eq!(
        engine.handle.open_external().await.unwrap(),
        ExternalTarget::DevServer(url)
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_external_prefers_dev_server_then_document() {
    let url = Url::parse("http://127.0.0.1:3000/demo/").unwrap();
    let engine = spawn_remote(
        FakeAuthority {
            dev_server: Some(url.clone()),
            ..FakeAuthority::with_snapshot("<p>snap</p>")
        },
        PreviewCache::new(),
    );
    settle().await;
    assert_eq!(
        engine.handle.open_external().await.unwrap(),
        ExternalTarget::DevServer(url)
    );

    let engine = spawn_remote(FakeAuthority::with_snapshot("<p>snap</p>"), PreviewCache::new());
    settle().await;
    assert_eq!(
        engine.handle.open_external().await.unwrap(),
        ExternalTarget::Document("<p>snap</p>".into())
    );
}
