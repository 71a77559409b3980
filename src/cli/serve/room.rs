//! Real-time room server.
//!
//! ```text
//! acceptor thread ── handshake ──► Inbound::Client ─┐
//! HTTP pool       ── PUT …/file ─► Inbound::Push   ─┼──► reader thread (owns every socket)
//!                                                   │       polls non-blocking reads,
//!                                                   │       applies edits to the store,
//!                                                   │       answers + broadcasts
//! ```
//!
//! The requester gets its answer with the `seq` it sent; every other member
//! of the same project gets the same document without `seq`.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{self, Receiver, Sender};
use tungstenite::{Message, WebSocket};

use super::store::{ProjectStore, StoreError};
use crate::error::CompileError;
use crate::sync::{Seq, WireMessage};

/// Idle sleep between polls of all sockets.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Upper bound for a client to finish the WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// What reaches the reader thread from outside.
pub enum Inbound {
    Client(WebSocket<TcpStream>),
    /// A document produced outside the room (HTTP edit) for all members.
    Push { project_id: String, message: WireMessage },
}

/// Handle to the running room threads.
pub struct RoomServer {
    addr: SocketAddr,
    tx: Sender<Inbound>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl RoomServer {
    /// Bind `listener`'s socket and start the acceptor and reader threads.
    pub fn start(listener: TcpListener, store: Arc<ProjectStore>, token: String) -> Result<Self> {
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let (tx, rx) = channel::unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let acceptor = {
            let tx = tx.clone();
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("room-accept".into())
                .spawn(move || accept_loop(&listener, &tx, &stop))?
        };
        let reader = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("room-read".into())
                .spawn(move || Room::new(store, token).run(&rx, &stop))?
        };

        crate::log!("room"; "ws://{}", addr);
        Ok(Self {
            addr,
            tx,
            stop,
            threads: vec![acceptor, reader],
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sender for documents to broadcast into a project's room.
    pub fn sender(&self) -> Sender<Inbound> {
        self.tx.clone()
    }

    /// Stop both threads and close every connection.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

fn stopped(stop: &AtomicBool) -> bool {
    stop.load(Ordering::SeqCst) || crate::core::is_shutdown()
}

fn accept_loop(listener: &TcpListener, tx: &Sender<Inbound>, stop: &AtomicBool) {
    while !stopped(stop) {
        match listener.accept() {
            Ok((stream, addr)) => {
                crate::debug!("room"; "client connected: {}", addr);
                match handshake(stream) {
                    Ok(ws) => {
                        if tx.send(Inbound::Client(ws)).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::debug!("room"; "handshake with {} failed: {}", addr, e),
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                crate::log!("room"; "accept error: {}", e);
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Blocking handshake, then switch the socket to non-blocking for polling.
fn handshake(stream: TcpStream) -> Result<WebSocket<TcpStream>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let ws = tungstenite::accept(stream).map_err(|e| anyhow::anyhow!("{e}"))?;
    ws.get_ref().set_read_timeout(None)?;
    ws.get_ref().set_nonblocking(true)?;
    Ok(ws)
}

// =============================================================================
// Room state (reader thread)
// =============================================================================

struct Member {
    project_id: String,
    user_id: String,
}

struct Client {
    id: u64,
    ws: WebSocket<TcpStream>,
    member: Option<Member>,
    /// Drop after the pending frames are flushed.
    closing: bool,
    dead: bool,
}

enum Target {
    Client(u64),
    /// Everyone in the project except the sender.
    Others { project_id: String, except: u64 },
}

struct Outgoing {
    to: Target,
    message: WireMessage,
}

struct Room {
    store: Arc<ProjectStore>,
    token: String,
    clients: Vec<Client>,
    next_id: u64,
}

impl Room {
    fn new(store: Arc<ProjectStore>, token: String) -> Self {
        Self {
            store,
            token,
            clients: Vec::new(),
            next_id: 0,
        }
    }

    fn run(mut self, rx: &Receiver<Inbound>, stop: &AtomicBool) {
        while !stopped(stop) {
            let mut busy = false;
            while let Ok(inbound) = rx.try_recv() {
                busy = true;
                self.inbound(inbound);
            }
            busy |= self.poll();
            self.flush();
            if !busy {
                thread::sleep(POLL_INTERVAL);
            }
        }
        for client in &mut self.clients {
            let _ = client.ws.close(None);
            let _ = client.ws.flush();
        }
    }

    fn inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Client(ws) => {
                self.next_id += 1;
                self.clients.push(Client {
                    id: self.next_id,
                    ws,
                    member: None,
                    closing: false,
                    dead: false,
                });
            }
            Inbound::Push { project_id, message } => self.deliver(vec![Outgoing {
                to: Target::Others {
                    project_id,
                    except: 0,
                },
                message,
            }]),
        }
    }

    /// Read every available frame. Returns whether anything arrived.
    fn poll(&mut self) -> bool {
        let mut busy = false;
        for i in 0..self.clients.len() {
            loop {
                if self.clients[i].dead {
                    break;
                }
                match self.clients[i].ws.read() {
                    Ok(Message::Text(text)) => {
                        busy = true;
                        let replies = self.handle_frame(i, text.as_str());
                        self.deliver(replies);
                    }
                    Ok(Message::Close(_)) => {
                        self.clients[i].dead = true;
                    }
                    Ok(_) => {}
                    Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        crate::debug!("room"; "client {} dropped: {}", self.clients[i].id, e);
                        self.clients[i].dead = true;
                    }
                }
            }
        }

        let before = self.clients.len();
        self.clients.retain(|c| !c.dead);
        if self.clients.len() != before {
            crate::debug!("room"; "{} client(s) connected", self.clients.len());
        }
        busy
    }

    fn flush(&mut self) {
        for client in &mut self.clients {
            match client.ws.flush() {
                Ok(()) => {}
                Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(_) => client.dead = true,
            }
            if client.closing {
                let _ = client.ws.close(None);
                let _ = client.ws.flush();
                client.dead = true;
            }
        }
    }

    fn handle_frame(&mut self, i: usize, text: &str) -> Vec<Outgoing> {
        let id = self.clients[i].id;
        let Some(wire) = WireMessage::from_json(text) else {
            crate::debug!("room"; "ignoring malformed frame from client {}", id);
            return Vec::new();
        };
        let reply = |message| Outgoing {
            to: Target::Client(id),
            message,
        };

        match wire {
            WireMessage::JoinProject {
                project_id,
                user_id,
                token,
            } => {
                if !self.token.is_empty() && token != self.token {
                    crate::log!("room"; "rejected {} for {}: bad token", user_id, project_id);
                    self.clients[i].closing = true;
                    return vec![reply(WireMessage::JoinRejected {
                        reason: "invalid token".into(),
                    })];
                }
                if let Err(e) = self.store.ensure(&project_id) {
                    self.clients[i].closing = true;
                    return vec![reply(WireMessage::JoinRejected {
                        reason: e.to_string(),
                    })];
                }
                crate::log!("room"; "{} joined {}", user_id, project_id);
                self.clients[i].member = Some(Member {
                    project_id: project_id.clone(),
                    user_id,
                });
                vec![reply(WireMessage::JoinedProject { project_id })]
            }
            WireMessage::UpdateFile {
                seq,
                project_id,
                file_path,
                content,
                removed,
            } => {
                if !self.is_member(i, &project_id) {
                    return vec![reply(not_joined(seq, Some(file_path)))];
                }
                let result = self.store.apply(&project_id, &file_path, &content, removed);
                self.answer(id, seq, project_id, Some(file_path), result)
            }
            WireMessage::RefreshPreview { seq, project_id } => {
                if !self.is_member(i, &project_id) {
                    return vec![reply(not_joined(seq, None))];
                }
                let result = self.store.compile(&project_id);
                match result {
                    Ok(doc) => vec![reply(WireMessage::PreviewUpdated {
                        seq: Some(seq),
                        html: doc.html,
                        file_path: None,
                    })],
                    Err(e) => vec![reply(WireMessage::PreviewError {
                        seq: Some(seq),
                        error: error_message(&e),
                        file_path: None,
                    })],
                }
            }
            WireMessage::JoinedProject { .. }
            | WireMessage::JoinRejected { .. }
            | WireMessage::PreviewUpdated { .. }
            | WireMessage::PreviewError { .. } => {
                crate::debug!("room"; "ignoring server frame from client {}", id);
                Vec::new()
            }
        }
    }

    /// Reply to the requester and mirror the outcome to the rest of the room.
    fn answer(
        &self,
        id: u64,
        seq: Seq,
        project_id: String,
        file_path: Option<String>,
        result: Result<crate::compiler::CompiledDocument, StoreError>,
    ) -> Vec<Outgoing> {
        let (mine, theirs) = match result {
            Ok(doc) => (
                WireMessage::PreviewUpdated {
                    seq: Some(seq),
                    html: doc.html.clone(),
                    file_path: file_path.clone(),
                },
                Some(WireMessage::PreviewUpdated {
                    seq: None,
                    html: doc.html,
                    file_path,
                }),
            ),
            Err(e) => {
                let error = error_message(&e);
                let broadcast = matches!(e, StoreError::Compile(_)).then(|| WireMessage::PreviewError {
                    seq: None,
                    error: error.clone(),
                    file_path: file_path.clone(),
                });
                (
                    WireMessage::PreviewError {
                        seq: Some(seq),
                        error,
                        file_path,
                    },
                    broadcast,
                )
            }
        };

        let mut out = vec![Outgoing {
            to: Target::Client(id),
            message: mine,
        }];
        if let Some(message) = theirs {
            out.push(Outgoing {
                to: Target::Others {
                    project_id,
                    except: id,
                },
                message,
            });
        }
        out
    }

    fn is_member(&self, i: usize, project_id: &str) -> bool {
        self.clients[i]
            .member
            .as_ref()
            .is_some_and(|m| m.project_id == project_id)
    }

    fn deliver(&mut self, outgoing: Vec<Outgoing>) {
        for Outgoing { to, message } in outgoing {
            let frame = message.to_json();
            for client in &mut self.clients {
                let addressed = match &to {
                    Target::Client(id) => client.id == *id,
                    Target::Others { project_id, except } => {
                        client.id != *except
                            && client
                                .member
                                .as_ref()
                                .is_some_and(|m| &m.project_id == project_id)
                    }
                };
                if addressed {
                    send(client, &frame);
                }
            }
        }
    }
}

fn send(client: &mut Client, frame: &str) {
    match client.ws.send(Message::text(frame.to_owned())) {
        Ok(()) => {}
        // queued; the next flush writes it out
        Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
        Err(e) => {
            let user = client.member.as_ref().map_or("?", |m| m.user_id.as_str());
            crate::debug!("room"; "send to {} failed: {}", user, e);
            client.dead = true;
        }
    }
}

fn not_joined(seq: Seq, file_path: Option<String>) -> WireMessage {
    WireMessage::PreviewError {
        seq: Some(seq),
        error: "not joined to this project".into(),
        file_path,
    }
}

/// Message text without the file prefix; `filePath` travels separately.
fn error_message(e: &StoreError) -> String {
    match e {
        StoreError::Compile(CompileError::Source { message, .. }) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tungstenite::stream::MaybeTlsStream;

    type ClientWs = WebSocket<MaybeTlsStream<TcpStream>>;

    fn start(token: &str) -> RoomServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        RoomServer::start(listener, Arc::new(ProjectStore::new()), token.into()).unwrap()
    }

    fn connect(room: &RoomServer) -> ClientWs {
        let (ws, _) = tungstenite::connect(format!("ws://{}", room.addr())).unwrap();
        if let MaybeTlsStream::Plain(stream) = ws.get_ref() {
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        }
        ws
    }

    fn send_wire(ws: &mut ClientWs, msg: WireMessage) {
        ws.send(Message::text(msg.to_json())).unwrap();
    }

    fn recv(ws: &mut ClientWs) -> WireMessage {
        loop {
            if let Message::Text(text) = ws.read().unwrap() {
                return WireMessage::from_json(text.as_str()).unwrap();
            }
        }
    }

    fn join(ws: &mut ClientWs, user: &str, token: &str) -> WireMessage {
        send_wire(
            ws,
            WireMessage::JoinProject {
                project_id: "demo".into(),
                user_id: user.into(),
                token: token.into(),
            },
        );
        recv(ws)
    }

    fn update(seq: Seq, body: &str) -> WireMessage {
        WireMessage::UpdateFile {
            seq,
            project_id: "demo".into(),
            file_path: "index.html".into(),
            content: format!("<html><body>{body}</body></html>"),
            removed: false,
        }
    }

    #[test]
    fn test_update_echoes_seq_and_broadcasts() {
        let room = start("");
        let mut alice = connect(&room);
        let mut bob = connect(&room);
        assert_eq!(
            join(&mut alice, "alice", ""),
            WireMessage::JoinedProject {
                project_id: "demo".into()
            }
        );
        assert!(matches!(join(&mut bob, "bob", ""), WireMessage::JoinedProject { .. }));

        send_wire(&mut alice, update(7, "<p>from alice</p>"));
        match recv(&mut alice) {
            WireMessage::PreviewUpdated { seq, html, file_path } => {
                assert_eq!(seq, Some(7));
                assert!(html.contains("<p>from alice</p>"));
                assert_eq!(file_path.as_deref(), Some("index.html"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match recv(&mut bob) {
            WireMessage::PreviewUpdated { seq, html, .. } => {
                assert_eq!(seq, None);
                assert!(html.contains("<p>from alice</p>"));
            }
            other => panic!("unexpected {other:?}"),
        }
        room.stop();
    }

    #[test]
    fn test_bad_token_is_rejected() {
        let room = start("secret");
        let mut ws = connect(&room);
        assert_eq!(
            join(&mut ws, "mallory", "guess"),
            WireMessage::JoinRejected {
                reason: "invalid token".into()
            }
        );

        let mut ok = connect(&room);
        assert!(matches!(join(&mut ok, "alice", "secret"), WireMessage::JoinedProject { .. }));
        room.stop();
    }

    #[test]
    fn test_update_before_join_is_refused() {
        let room = start("");
        let mut ws = connect(&room);
        send_wire(&mut ws, update(1, "x"));
        assert!(matches!(recv(&mut ws), WireMessage::PreviewError { seq: Some(1), .. }));
        room.stop();
    }

    #[test]
    fn test_compile_error_and_refresh() {
        let room = start("");
        let mut ws = connect(&room);
        join(&mut ws, "alice", "");

        send_wire(
            &mut ws,
            WireMessage::UpdateFile {
                seq: 1,
                project_id: "demo".into(),
                file_path: "src/App.tsx".into(),
                content: "export default function App(){ return (<div>{oops</div>)".into(),
                removed: false,
            },
        );
        match recv(&mut ws) {
            WireMessage::PreviewError { seq, error, file_path } => {
                assert_eq!(seq, Some(1));
                assert!(error.starts_with("unterminated"));
                assert_eq!(file_path.as_deref(), Some("src/App.tsx"));
            }
            other => panic!("unexpected {other:?}"),
        }

        send_wire(
            &mut ws,
            WireMessage::RefreshPreview {
                seq: 2,
                project_id: "demo".into(),
            },
        );
        assert!(matches!(recv(&mut ws), WireMessage::PreviewError { seq: Some(2), .. }));
        room.stop();
    }

    #[test]
    fn test_push_reaches_members() {
        let room = start("");
        let mut ws = connect(&room);
        join(&mut ws, "alice", "");

        room.sender()
            .send(Inbound::Push {
                project_id: "demo".into(),
                message: WireMessage::PreviewUpdated {
                    seq: None,
                    html: "<p>http edit</p>".into(),
                    file_path: Some("a.html".into()),
                },
            })
            .unwrap();
        assert!(matches!(recv(&mut ws), WireMessage::PreviewUpdated { seq: None, .. }));
        room.stop();
    }
}
