//! Failure types for the preview pipeline.
//!
//! | Type             | Raised by                     | Recovered by                    |
//! |------------------|-------------------------------|---------------------------------|
//! | `CompileError`   | compilers, JSX translator     | `ErrorPresenter` overlay        |
//! | `TransportError` | SyncChannel, HTTP authority   | HTTP fallback, then local build |
//! | `AuthError`      | join / authenticated HTTP     | bounded retries, then banner    |
//!
//! Stale responses are not errors: they are dropped by the sequence gate
//! (`sync::Admission::Stale`) and only logged.

mod presenter;

pub use presenter::{ErrorKind, ErrorPresenter, ErrorView};

use std::time::Duration;

use thiserror::Error;

/// A compiler or translator met input it cannot shape into markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unterminated `{{` expression starting at byte {offset}")]
    UnterminatedExpression { offset: usize },

    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },

    #[error("unterminated <{tag}> tag starting at byte {offset}")]
    UnterminatedTag { tag: String, offset: usize },

    #[error("{path}: {message}")]
    Source { path: String, message: String },

    /// Reported by the remote compile authority.
    #[error("{0}")]
    Remote(String),
}

impl CompileError {
    /// Attach the file the error came from.
    pub fn in_file(self, path: &str) -> Self {
        match self {
            Self::Source { .. } | Self::Remote(_) => self,
            other => Self::Source {
                path: path.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// The real-time channel or the HTTP surface failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Missing or rejected credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no token configured")]
    MissingToken,

    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("gave up after {0} rejected attempts; reconnect required")]
    RetriesExhausted(u32),
}

/// Any failure the engine can surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl PreviewError {
    /// Transport and auth failures are worth a local retry; compile errors are not.
    pub fn is_recoverable_locally(&self) -> bool {
        !matches!(self, Self::Compile(_))
    }
}
