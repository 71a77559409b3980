//! Engine commands and the handle that sends them.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use super::session::SessionSnapshot;
use crate::tree::EditorInput;

/// Commands accepted by the engine actor.
#[derive(Debug)]
pub enum EngineMsg {
    /// The editor's tree changed; compile after the debounce window.
    FilesChanged(EditorInput),
    /// Compile now, bypassing the debounce window.
    Refresh,
    /// Retry after a failure.
    Retry,
    /// Off: changes are kept but only compiled on refresh.
    SetHotReload(bool),
    /// Show an external server the caller vouches for (strict sandbox).
    EnableDevServer(Url),
    /// Ask the authority to start the project's dev server and show it.
    StartDevServer,
    /// Back to painted documents.
    DisableDevServer,
    /// Where "open in new tab" should go.
    OpenExternal(oneshot::Sender<ExternalTarget>),
    Inspect(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Target for opening the preview outside the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalTarget {
    /// A real dev server for the project.
    DevServer(Url),
    /// The compiled document, exported as-is.
    Document(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("preview engine has stopped")]
pub struct EngineStopped;

/// Cloneable sender side of an engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMsg>,
}

impl EngineHandle {
    pub(super) fn new(tx: mpsc::Sender<EngineMsg>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, msg: EngineMsg) -> Result<(), EngineStopped> {
        self.tx.send(msg).await.map_err(|_| EngineStopped)
    }

    /// Send from a thread outside the runtime.
    pub fn blocking_send(&self, msg: EngineMsg) -> Result<(), EngineStopped> {
        self.tx.blocking_send(msg).map_err(|_| EngineStopped)
    }

    pub async fn files_changed(&self, input: EditorInput) -> Result<(), EngineStopped> {
        self.send(EngineMsg::FilesChanged(input)).await
    }

    pub async fn refresh(&self) -> Result<(), EngineStopped> {
        self.send(EngineMsg::Refresh).await
    }

    pub async fn retry(&self) -> Result<(), EngineStopped> {
        self.send(EngineMsg::Retry).await
    }

    pub async fn set_hot_reload(&self, enabled: bool) -> Result<(), EngineStopped> {
        self.send(EngineMsg::SetHotReload(enabled)).await
    }

    pub async fn enable_dev_server(&self, url: Url) -> Result<(), EngineStopped> {
        self.send(EngineMsg::EnableDevServer(url)).await
    }

    pub async fn start_dev_server(&self) -> Result<(), EngineStopped> {
        self.send(EngineMsg::StartDevServer).await
    }

    pub async fn disable_dev_server(&self) -> Result<(), EngineStopped> {
        self.send(EngineMsg::DisableDevServer).await
    }

    pub async fn open_external(&self) -> Result<ExternalTarget, EngineStopped> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMsg::OpenExternal(tx)).await?;
        rx.await.map_err(|_| EngineStopped)
    }

    pub async fn inspect(&self) -> Result<SessionSnapshot, EngineStopped> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMsg::Inspect(tx)).await?;
        rx.await.map_err(|_| EngineStopped)
    }

    pub async fn shutdown(&self) -> Result<(), EngineStopped> {
        self.send(EngineMsg::Shutdown).await
    }
}
