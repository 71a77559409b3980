//! Remote compile authority access.
//!
//! - `message` - room protocol frames and their logical meaning
//! - `sequence` - request ids and stale-response discard
//! - `channel` - WebSocket room client with reconnect and bounded auth retries
//! - `http` - stateless HTTP calls (seed, fallback, dev server)

mod channel;
mod http;
mod message;
mod sequence;

pub use channel::{
    ChannelConfig, ChannelRegistry, ConnectionState, RemoteEnd, RemoteLink, SyncChannel, SyncEvent,
};
pub use http::{CompileAuthority, DevServerResponse, ErrorResponse, FileUpdate, HtmlResponse, HttpAuthority};
pub use message::{SyncMessage, WireMessage};
pub use sequence::{Admission, Seq, SequenceGate};
