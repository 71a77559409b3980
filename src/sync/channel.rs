//! Real-time connection to a compile authority.
//!
//! ```text
//!            RemoteLink                      channel task
//! Engine ──► outgoing (SyncMessage) ──► ws sink   (after joined-project)
//! Engine ◄── events   (SyncEvent)   ◄── ws stream
//!
//! connect ─► join-project ─► joined-project ─► exchange frames
//!    ▲                  └─► join-rejected ──► retry, bounded
//!    └──── backoff ◄──── closed / connect error
//! ```
//!
//! One connection per `projectId + userId` is live process-wide; opening a
//! second one aborts the first (see [`ChannelRegistry`]).

use std::sync::LazyLock;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;

use super::message::{SyncMessage, WireMessage};
use crate::error::{AuthError, TransportError};

const BACKOFF_BASE: Duration = Duration::from_millis(250);
const BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Where the session's connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// Local transport; no channel exists.
    Local,
    Connecting,
    Connected,
    /// Lost; requests use the HTTP fallback until rejoined.
    Disconnected,
    /// Credentials rejected too often; no further automatic attempts.
    ReconnectRequired,
}

/// What the channel task reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Room joined; updates may flow.
    Joined,
    /// Connection lost or never established; reconnecting.
    Disconnected(TransportError),
    /// Join refused; another attempt follows unless the cap is reached.
    Rejected { reason: String, attempt: u32 },
    /// Auth retries exhausted; the task has stopped.
    GaveUp(AuthError),
    Message(SyncMessage),
}

// =============================================================================
// Link
// =============================================================================

/// Owner's half of a channel: send requests, receive events.
#[derive(Debug)]
pub struct RemoteLink {
    outgoing: mpsc::UnboundedSender<SyncMessage>,
    events: mpsc::UnboundedReceiver<SyncEvent>,
}

/// Transport's half of a channel.
#[derive(Debug)]
pub struct RemoteEnd {
    pub outgoing: mpsc::UnboundedReceiver<SyncMessage>,
    pub events: mpsc::UnboundedSender<SyncEvent>,
}

impl RemoteLink {
    /// A connected link/end pair.
    pub fn pair() -> (Self, RemoteEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: out_tx,
                events: ev_rx,
            },
            RemoteEnd {
                outgoing: out_rx,
                events: ev_tx,
            },
        )
    }

    pub fn send(&self, msg: SyncMessage) -> Result<(), TransportError> {
        self.outgoing
            .send(msg)
            .map_err(|_| TransportError::Send("channel task stopped".into()))
    }

    /// Next event; `None` once the transport side is gone.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }
}

// =============================================================================
// Channel
// =============================================================================

/// Connection parameters for one room.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub ws_url: String,
    pub project_id: String,
    pub user_id: String,
    pub token: String,
    pub max_auth_retries: u32,
}

pub struct SyncChannel;

impl SyncChannel {
    /// Spawn the connection task and return its link.
    ///
    /// Must be called inside a tokio runtime. Any live channel for the same
    /// project and user is aborted first.
    pub fn open(config: ChannelConfig) -> RemoteLink {
        let (link, end) = RemoteLink::pair();
        let key = (config.project_id.clone(), config.user_id.clone());
        let task = tokio::spawn(run(config, end));
        ChannelRegistry::global().register(key, task.abort_handle());
        link
    }
}

/// Why a connected session ended.
enum SessionEnd {
    Rejected(String),
    Closed(TransportError),
    OwnerGone,
}

async fn run(config: ChannelConfig, mut end: RemoteEnd) {
    let mut attempt = 0u32;
    let mut rejections = 0u32;

    loop {
        crate::debug!("sync"; "connecting to {} (attempt {})", config.ws_url, attempt + 1);

        let outcome = match tokio_tungstenite::connect_async(config.ws_url.as_str()).await {
            Ok((ws, _)) => session(ws, &config, &mut end, &mut attempt).await,
            Err(e) => SessionEnd::Closed(TransportError::Connect(e.to_string())),
        };

        match outcome {
            SessionEnd::OwnerGone => return,
            SessionEnd::Closed(err) => {
                crate::debug!("sync"; "{}", err);
                if end.events.send(SyncEvent::Disconnected(err)).is_err() {
                    return;
                }
            }
            SessionEnd::Rejected(reason) => {
                rejections += 1;
                crate::log!("sync"; "join rejected ({}/{}): {}", rejections, config.max_auth_retries, reason);
                let gave_up = if config.token.is_empty() {
                    Some(AuthError::MissingToken)
                } else if rejections >= config.max_auth_retries {
                    Some(AuthError::RetriesExhausted(rejections))
                } else {
                    None
                };
                let _ = end.events.send(SyncEvent::Rejected {
                    reason,
                    attempt: rejections,
                });
                if let Some(err) = gave_up {
                    let _ = end.events.send(SyncEvent::GaveUp(err));
                    return;
                }
            }
        }

        tokio::time::sleep(backoff(attempt)).await;
        attempt = attempt.saturating_add(1);
    }
}

async fn session<S>(ws: S, config: &ChannelConfig, end: &mut RemoteEnd, attempt: &mut u32) -> SessionEnd
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut stream) = ws.split();

    // Frames queued for an earlier connection; the owner resends after `Joined`.
    let stale = discard_queued(&mut end.outgoing);
    if stale > 0 {
        crate::debug!("sync"; "dropped {} frame(s) queued before reconnect", stale);
    }

    let join = WireMessage::JoinProject {
        project_id: config.project_id.clone(),
        user_id: config.user_id.clone(),
        token: config.token.clone(),
    };
    if let Err(e) = sink.send(Message::text(join.to_json())).await {
        return SessionEnd::Closed(TransportError::Send(e.to_string()));
    }

    let mut joined = false;
    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed(TransportError::Closed),
                    Some(Err(e)) => return SessionEnd::Closed(TransportError::Connect(e.to_string())),
                    Some(Ok(_)) => continue,
                };
                let event = match WireMessage::from_json(text.as_str()) {
                    Some(WireMessage::JoinedProject { .. }) => {
                        joined = true;
                        *attempt = 0;
                        crate::debug!("sync"; "joined room {}", config.project_id);
                        SyncEvent::Joined
                    }
                    Some(WireMessage::JoinRejected { reason }) => return SessionEnd::Rejected(reason),
                    Some(wire) => match SyncMessage::from_wire(wire) {
                        Some(msg) => SyncEvent::Message(msg),
                        None => continue,
                    },
                    None => {
                        crate::debug!("sync"; "ignoring malformed frame");
                        continue;
                    }
                };
                if end.events.send(event).is_err() {
                    return SessionEnd::OwnerGone;
                }
            }
            msg = end.outgoing.recv(), if joined => {
                let Some(msg) = msg else {
                    let _ = sink.close().await;
                    return SessionEnd::OwnerGone;
                };
                let frame = msg.into_wire(&config.project_id).to_json();
                if let Err(e) = sink.send(Message::text(frame)).await {
                    return SessionEnd::Closed(TransportError::Send(e.to_string()));
                }
            }
        }
    }
}

fn discard_queued(outgoing: &mut mpsc::UnboundedReceiver<SyncMessage>) -> usize {
    let mut dropped = 0;
    while outgoing.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

/// Reconnect delay: 250ms doubling, capped at 5s.
fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE
        .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
        .min(BACKOFF_MAX)
}

// =============================================================================
// Registry
// =============================================================================

type ChannelKey = (String, String);

/// Live channel tasks keyed by `(projectId, userId)`.
#[derive(Default)]
pub struct ChannelRegistry {
    tasks: Mutex<FxHashMap<ChannelKey, AbortHandle>>,
}

static REGISTRY: LazyLock<ChannelRegistry> = LazyLock::new(ChannelRegistry::default);

impl ChannelRegistry {
    pub fn global() -> &'static Self {
        &REGISTRY
    }

    /// Track `handle` under `key`, aborting whatever was there.
    pub fn register(&self, key: ChannelKey, handle: AbortHandle) {
        if let Some(previous) = self.tasks.lock().insert(key.clone(), handle) {
            crate::debug!("sync"; "replacing channel for {}/{}", key.0, key.1);
            previous.abort();
        }
    }

    /// Abort and forget the channel for `key`.
    pub fn close(&self, project_id: &str, user_id: &str) {
        let key = (project_id.to_string(), user_id.to_string());
        if let Some(handle) = self.tasks.lock().remove(&key) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_millis(250));
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(4), Duration::from_secs(4));
        assert_eq!(backoff(5), BACKOFF_MAX);
        assert_eq!(backoff(40), BACKOFF_MAX);
    }

    #[tokio::test]
    async fn test_registry_aborts_previous_channel() {
        let registry = ChannelRegistry::default();
        let first = tokio::spawn(std::future::pending::<()>());
        let second = tokio::spawn(std::future::pending::<()>());

        registry.register(("p".into(), "u".into()), first.abort_handle());
        registry.register(("p".into(), "u".into()), second.abort_handle());

        assert!(first.await.unwrap_err().is_cancelled());
        assert!(!second.is_finished());

        registry.close("p", "u");
        assert!(second.await.unwrap_err().is_cancelled());
        assert!(registry.tasks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_registry_keys_are_per_user() {
        let registry = ChannelRegistry::default();
        let a = tokio::spawn(std::future::pending::<()>());
        let b = tokio::spawn(std::future::pending::<()>());
        registry.register(("p".into(), "alice".into()), a.abort_handle());
        registry.register(("p".into(), "bob".into()), b.abort_handle());
        tokio::task::yield_now().await;
        assert!(!a.is_finished());
        assert!(!b.is_finished());
        registry.close("p", "alice");
        registry.close("p", "bob");
    }

    #[tokio::test]
    async fn test_link_pair() {
        let (mut link, mut end) = RemoteLink::pair();
        link.send(SyncMessage::RefreshRequested { seq: 1 }).unwrap();
        assert_eq!(
            end.outgoing.recv().await,
            Some(SyncMessage::RefreshRequested { seq: 1 })
        );
        end.events.send(SyncEvent::Joined).unwrap();
        assert_eq!(link.recv().await, Some(SyncEvent::Joined));

        drop(end);
        assert!(link.send(SyncMessage::RefreshRequested { seq: 2 }).is_err());
        assert_eq!(link.recv().await, None);
    }

    fn read_wire<S: std::io::Read + std::io::Write>(
        ws: &mut tokio_tungstenite::tungstenite::WebSocket<S>,
    ) -> WireMessage {
        loop {
            if let Message::Text(text) = ws.read().unwrap() {
                return WireMessage::from_json(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_frames_queued_across_reconnect_are_not_sent() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let joined = WireMessage::JoinedProject { project_id: "p".into() }.to_json();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tokio_tungstenite::tungstenite::accept(stream).unwrap();
            read_wire(&mut ws);
            ws.send(Message::text(joined.clone())).unwrap();
            drop(ws);

            let (stream, _) = listener.accept().unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            let mut ws = tokio_tungstenite::tungstenite::accept(stream).unwrap();
            assert!(matches!(read_wire(&mut ws), WireMessage::JoinProject { .. }));
            ws.send(Message::text(joined)).unwrap();
            read_wire(&mut ws)
        });

        let (mut link, end) = RemoteLink::pair();
        let config = ChannelConfig {
            ws_url: format!("ws://{addr}"),
            project_id: "p".into(),
            user_id: "u".into(),
            token: "t".into(),
            max_auth_retries: 3,
        };
        let task = tokio::spawn(run(config, end));

        assert_eq!(link.recv().await, Some(SyncEvent::Joined));
        assert!(matches!(link.recv().await, Some(SyncEvent::Disconnected(_))));

        link.send(SyncMessage::FileUpdated {
            seq: 1,
            path: "index.html".into(),
            content: "old".into(),
            removed: false,
        })
        .unwrap();

        assert_eq!(link.recv().await, Some(SyncEvent::Joined));
        link.send(SyncMessage::RefreshRequested { seq: 2 }).unwrap();

        let first = tokio::task::spawn_blocking(move || server.join().unwrap())
            .await
            .unwrap();
        assert_eq!(
            first,
            WireMessage::RefreshPreview {
                seq: 2,
                project_id: "p".into()
            }
        );
        task.abort();
    }

    #[test]
    fn test_discard_queued_empties_the_queue() {
        let (link, mut end) = RemoteLink::pair();
        link.send(SyncMessage::RefreshRequested { seq: 1 }).unwrap();
        link.send(SyncMessage::RefreshRequested { seq: 2 }).unwrap();
        assert_eq!(discard_queued(&mut end.outgoing), 2);
        assert!(end.outgoing.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_disconnect() {
        let (mut link, end) = RemoteLink::pair();
        let config = ChannelConfig {
            // port 9 (discard) on localhost is closed in test environments
            ws_url: "ws://127.0.0.1:9".into(),
            project_id: "p".into(),
            user_id: "u".into(),
            token: "t".into(),
            max_auth_retries: 3,
        };
        let task = tokio::spawn(run(config, end));
        match link.recv().await {
            Some(SyncEvent::Disconnected(TransportError::Connect(_))) => {}
            other => panic!("unexpected event: {other:?}"),
        }
        task.abort();
    }
}
