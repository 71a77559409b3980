//! Per-mount preview state.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use super::scheduler::RenderState;
use crate::cache::SessionKey;
use crate::compiler::CompiledDocument;
use crate::error::PreviewError;
use crate::sync::ConnectionState;

/// State of one mounted preview.
///
/// `last_document` is what the frame shows (or showed before an error
/// overlay); it is what the skip rule compares against and what error views
/// keep visible.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSession {
    pub session_key: SessionKey,
    pub project_id: String,
    pub last_document: Option<CompiledDocument>,
    pub hot_reload_enabled: bool,
    pub connection_state: ConnectionState,
    #[serde(skip)]
    pub last_error: Option<PreviewError>,
    pub dev_server: Option<Url>,
    pub stats: RenderStats,
}

impl PreviewSession {
    pub fn new(project_id: &str, route: Option<&str>, connection_state: ConnectionState) -> Self {
        let session_key = match route {
            Some(route) => SessionKey::with_route(project_id, route),
            None => SessionKey::new(project_id),
        };
        Self {
            session_key,
            project_id: project_id.to_string(),
            last_document: None,
            hot_reload_enabled: true,
            connection_state,
            last_error: None,
            dev_server: None,
            stats: RenderStats::default(),
        }
    }

    pub fn last_html(&self) -> Option<&str> {
        self.last_document.as_ref().map(|d| d.html.as_str())
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStats {
    /// Compiles run in-process.
    pub local_compiles: u32,
    /// Requests sent to the compile authority (room or HTTP).
    pub remote_requests: u32,
    pub paints: u32,
    /// Results equal to the shown document.
    pub skips: u32,
    pub failures: u32,
    /// Responses dropped by the sequence gate.
    pub stale_discards: u32,
    /// Request-to-paint time of the last paint.
    pub last_latency_ms: Option<u64>,
}

impl RenderStats {
    pub fn record_paint(&mut self, latency: Duration) {
        self.paints += 1;
        self.last_latency_ms = Some(latency.as_millis() as u64);
    }
}

/// Point-in-time view of an engine, for hosts and tests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: PreviewSession,
    pub state: RenderState,
    /// A request is awaiting its answer.
    pub in_flight: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_from_route() {
        let s = PreviewSession::new("demo", Some("/dashboard"), ConnectionState::Local);
        assert_eq!(s.session_key.as_str(), "preview:demo:dashboard");
        let s = PreviewSession::new("demo", None, ConnectionState::Local);
        assert_eq!(s.session_key.as_str(), "preview:demo");
        assert!(s.hot_reload_enabled);
        assert_eq!(s.last_html(), None);
    }

    #[test]
    fn test_record_paint() {
        let mut stats = RenderStats::default();
        stats.record_paint(Duration::from_millis(42));
        assert_eq!(stats.paints, 1);
        assert_eq!(stats.last_latency_ms, Some(42));
    }

    #[test]
    fn test_session_json_is_camel_case() {
        let s = PreviewSession::new("demo", None, ConnectionState::Connected);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["sessionKey"], "preview:demo");
        assert_eq!(json["connectionState"], "connected");
        assert_eq!(json["hotReloadEnabled"], true);
        assert_eq!(json["stats"]["staleDiscards"], 0);
    }
}
