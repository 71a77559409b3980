//! Error view rendering.
//!
//! A failure never blanks the preview: when a good document is already on
//! screen the error is spliced in as a banner on top of it; otherwise a
//! standalone error document is produced. Both carry the raw error text and a
//! retry control that posts `{type: "instaview-retry"}` to the embedding page.

use serde::Serialize;

use super::PreviewError;
use crate::utils::html::{escape, inject_before_body_end};

/// Element id of the banner, so hosts can find and remove it.
pub const OVERLAY_ID: &str = "instaview-error";

/// What kind of failure is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Compilation failed; last good paint stays underneath.
    Compile,
    /// Transport lost; edits keep compiling through a fallback path.
    Offline,
    /// Credentials rejected too often; user action needed.
    ReconnectRequired,
}

impl ErrorKind {
    pub fn heading(self) -> &'static str {
        match self {
            Self::Compile => "Preview failed to compile",
            Self::Offline => "Offline: previewing locally",
            Self::ReconnectRequired => "Reconnect required",
        }
    }
}

/// Everything a host needs to show one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
    pub retry: bool,
}

/// Builds error views and the markup that displays them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorPresenter;

impl ErrorPresenter {
    /// Classify a failure into a view.
    pub fn present(error: &PreviewError) -> ErrorView {
        let kind = match error {
            PreviewError::Compile(_) => ErrorKind::Compile,
            PreviewError::Transport(_) => ErrorKind::Offline,
            PreviewError::Auth(_) => ErrorKind::ReconnectRequired,
        };
        ErrorView {
            kind,
            message: error.to_string(),
            retry: true,
        }
    }

    /// Document to paint for `view`, keeping `last_good` visible when present.
    pub fn render(view: &ErrorView, last_good: Option<&str>) -> String {
        match last_good {
            Some(html) => inject_before_body_end(html, &Self::banner(view)),
            None => Self::standalone(view),
        }
    }

    /// The banner markup alone.
    pub fn banner(view: &ErrorView) -> String {
        let retry = if view.retry {
            r#"<button type="button" style="margin-top:8px;padding:4px 12px;border-radius:4px;border:1px solid #fca5a5;background:#fff;color:#991b1b;cursor:pointer" onclick="parent.postMessage({type:'instaview-retry'},'*')">Retry</button>"#
        } else {
            ""
        };
        format!(
            concat!(
                r#"<div id="{id}" role="alert" data-kind="{kind}" "#,
                r#"style="position:fixed;left:12px;right:12px;bottom:12px;z-index:2147483647;"#,
                r#"padding:12px 16px;border-radius:8px;background:#fef2f2;color:#991b1b;"#,
                r#"border:1px solid #fecaca;font:13px/1.4 ui-monospace,monospace;"#,
                r#"box-shadow:0 4px 12px rgba(0,0,0,.15)">"#,
                "<strong>{heading}</strong>",
                r#"<pre style="margin:6px 0 0;white-space:pre-wrap">{message}</pre>{retry}</div>"#
            ),
            id = OVERLAY_ID,
            kind = kind_attr(view.kind),
            heading = view.kind.heading(),
            message = escape(&view.message),
            retry = retry,
        )
    }

    fn standalone(view: &ErrorView) -> String {
        format!(
            concat!(
                "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n",
                "<title>{heading}</title>\n</head>\n",
                "<body style=\"margin:0;min-height:100vh;background:#fff\">\n{banner}\n</body>\n</html>\n"
            ),
            heading = view.kind.heading(),
            banner = Self::banner(view),
        )
    }
}

fn kind_attr(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Compile => "compile",
        ErrorKind::Offline => "offline",
        ErrorKind::ReconnectRequired => "reconnect-required",
    }
}
