//! Paint targets.
//!
//! The engine is the only writer of its frame. A frame receives whole
//! documents and replaces its content in one step, the way an iframe's
//! `srcdoc` is assigned, never as a streamed open/write/close cycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{ErrorPresenter, ErrorView};
use crate::sync::ConnectionState;
use crate::utils::html::escape_attr;

/// Sandbox applied to what the frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sandbox {
    /// Locally compiled or unverified content: no top navigation, no popups.
    #[default]
    Strict,
    /// A running dev server owned by the project.
    Relaxed,
}

impl Sandbox {
    /// Value of the iframe `sandbox` attribute.
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::Strict => "allow-scripts allow-same-origin allow-forms",
            Self::Relaxed => {
                "allow-scripts allow-same-origin allow-forms allow-popups allow-modals allow-downloads"
            }
        }
    }
}

/// Where painted documents go.
pub trait PreviewFrame: Send {
    /// Replace the shown document in one step.
    fn paint(&mut self, html: &str) -> io::Result<()>;

    /// Show an external URL instead of painted documents.
    fn navigate(&mut self, url: &Url, sandbox: Sandbox) -> io::Result<()>;

    /// Show a failure without blanking: `last_good` stays visible under it.
    fn show_error(&mut self, view: &ErrorView, last_good: Option<&str>) -> io::Result<()> {
        self.paint(&ErrorPresenter::render(view, last_good))
    }

    /// A recompile produced the document already shown.
    fn unchanged(&mut self) {}

    fn connection_changed(&mut self, _state: ConnectionState) {}
}

// =============================================================================
// FileFrame
// =============================================================================

/// Frame backed by one HTML file on disk.
///
/// Every paint writes a sibling temp file and renames it over the target,
/// so a browser reloading the file never sees a half-written document.
pub struct FileFrame {
    path: PathBuf,
    status: bool,
}

impl FileFrame {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: false,
        }
    }

    /// Also report paints on the terminal status line.
    pub fn with_status(mut self) -> Self {
        self.status = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replace(&self, html: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, html)?;
        fs::rename(&tmp, &self.path)
    }
}

impl PreviewFrame for FileFrame {
    fn paint(&mut self, html: &str) -> io::Result<()> {
        self.replace(html)?;
        if self.status {
            crate::logger::status_painted(&self.path.display().to_string());
        }
        Ok(())
    }

    fn navigate(&mut self, url: &Url, sandbox: Sandbox) -> io::Result<()> {
        self.replace(&external_document(url, sandbox))?;
        if self.status {
            crate::logger::status_painted(&format!("showing {url}"));
        }
        Ok(())
    }

    fn show_error(&mut self, view: &ErrorView, last_good: Option<&str>) -> io::Result<()> {
        self.replace(&ErrorPresenter::render(view, last_good))?;
        if self.status {
            crate::logger::status_error(view.kind.heading(), &view.message);
        }
        Ok(())
    }

    fn unchanged(&mut self) {
        if self.status {
            crate::logger::status_unchanged(&self.path.display().to_string());
        }
    }

    fn connection_changed(&mut self, state: ConnectionState) {
        if !self.status {
            return;
        }
        match state {
            ConnectionState::Disconnected => {
                crate::logger::status_warning("offline: compiling through HTTP fallback")
            }
            ConnectionState::ReconnectRequired => {
                crate::logger::status_warning("reconnect required: compiling locally")
            }
            _ => {}
        }
    }
}

/// Full-viewport wrapper that frames `url` under `sandbox`.
pub fn external_document(url: &Url, sandbox: Sandbox) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n",
            "<title>{url}</title>\n",
            "<style>html,body{{margin:0;height:100%}}iframe{{border:0;width:100%;height:100%}}</style>\n",
            "</head>\n<body>\n<iframe src=\"{url}\" sandbox=\"{sandbox}\"></iframe>\n</body>\n</html>\n"
        ),
        url = escape_attr(url.as_str()),
        sandbox = sandbox.attribute(),
    )
}
