//! HTTP surface of the compile authority.
//!
//! ```text
//! GET  /health                        → "ok"
//! GET  /preview/project/{id}/html     → full document
//! PUT  /preview/project/{id}/file     {filePath, content} → {html}
//! POST /devserver/start/{id}          → {url}
//! ```

use tiny_http::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Snapshot(String),
    PutFile(String),
    StartDevServer(String),
    /// Known path, wrong method.
    MethodNotAllowed,
    NotFound,
}

impl Route {
    pub fn parse(method: &Method, url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let (route, allowed) = match segments.as_slice() {
            ["health"] => (Self::Health, Method::Get),
            ["preview", "project", id, "html"] => (Self::Snapshot(decode(id)), Method::Get),
            ["preview", "project", id, "file"] => (Self::PutFile(decode(id)), Method::Put),
            ["devserver", "start", id] => (Self::StartDevServer(decode(id)), Method::Post),
            _ => return Self::NotFound,
        };

        let head_ok = allowed == Method::Get && *method == Method::Head;
        if *method == allowed || head_ok {
            route
        } else {
            Self::MethodNotAllowed
        }
    }
}

fn decode(segment: &str) -> String {
    percent_encoding::percent_decode_str(segment)
        .decode_utf8_lossy()
        .into_owned()
}
