//! How compile requests leave the engine.
//!
//! ```text
//! Local                         compile in-process, synchronously
//! Remote, room joined           update-file per changed path (last seq awaited)
//! Remote, room down             HTTP: PUT each changed path, or GET the snapshot
//! Remote, reconnect required    compile in-process
//! ```
//!
//! The remote side keeps a baseline of what the authority is believed to
//! hold, so only the delta travels. Rejoining or a failed request clears it
//! and the next request resends everything. HTTP uploads record each path
//! as the authority acknowledges it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PreviewError, TransportError};
use crate::sync::{
    CompileAuthority, ConnectionState, RemoteLink, Seq, SequenceGate, SyncEvent, SyncMessage,
};
use crate::tree::FlatFileMap;

/// Chosen once, when the engine is built.
pub enum TransportStrategy {
    Local,
    Remote(RemoteTransport),
}

impl TransportStrategy {
    pub fn local() -> Self {
        Self::Local
    }

    pub fn remote(link: RemoteLink, authority: Arc<dyn CompileAuthority>) -> Self {
        Self::Remote(RemoteTransport {
            link,
            authority,
            baseline: Arc::new(Mutex::new(FlatFileMap::new())),
            closed: false,
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Connection state a fresh session starts in.
    pub fn initial_state(&self) -> ConnectionState {
        match self {
            Self::Local => ConnectionState::Local,
            Self::Remote(_) => ConnectionState::Connecting,
        }
    }

    pub fn authority(&self) -> Option<Arc<dyn CompileAuthority>> {
        match self {
            Self::Local => None,
            Self::Remote(remote) => Some(Arc::clone(&remote.authority)),
        }
    }

    /// Next channel event. Never resolves for local transport or once the
    /// channel task is gone.
    pub(super) async fn next_event(&mut self) -> SyncEvent {
        match self {
            Self::Remote(remote) if !remote.closed => match remote.link.recv().await {
                Some(event) => event,
                None => {
                    remote.closed = true;
                    SyncEvent::Disconnected(TransportError::Closed)
                }
            },
            _ => std::future::pending().await,
        }
    }
}

pub struct RemoteTransport {
    link: RemoteLink,
    authority: Arc<dyn CompileAuthority>,
    baseline: Arc<Mutex<FlatFileMap>>,
    closed: bool,
}

impl RemoteTransport {
    /// Send the delta through the room. Returns the seq to await.
    ///
    /// Every message is issued its own seq so the gate only admits the
    /// answer to the last one.
    pub(super) fn send_room(
        &mut self,
        files: &FlatFileMap,
        gate: &mut SequenceGate,
    ) -> Result<Seq, PreviewError> {
        let mut messages = Vec::new();
        {
            let baseline = self.baseline.lock();
            for path in files.removed_since(&baseline) {
                messages.push((path.to_string(), String::new(), true));
            }
            for (path, content) in files.changed_since(&baseline) {
                messages.push((path.to_string(), content.to_string(), false));
            }
        }

        let mut seq = 0;
        if messages.is_empty() {
            seq = gate.issue();
            self.link.send(SyncMessage::RefreshRequested { seq })?;
        }
        for (path, content, removed) in messages {
            seq = gate.issue();
            let sent = self.link.send(SyncMessage::FileUpdated {
                seq,
                path,
                content,
                removed,
            });
            if let Err(e) = sent {
                self.reset_baseline();
                return Err(e.into());
            }
        }
        *self.baseline.lock() = files.clone();
        Ok(seq)
    }

    /// Build the HTTP fallback request for the delta.
    ///
    /// The baseline is left alone here; the request records each path once
    /// the authority has stored it. Deletions cannot travel over the
    /// stateless surface, so they stay in the baseline and reach the
    /// authority with the next room request.
    pub(super) fn http_request(&self, project_id: &str, files: &FlatFileMap) -> HttpRequest {
        let uploads = files
            .changed_since(&self.baseline.lock())
            .into_iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        HttpRequest {
            authority: Arc::clone(&self.authority),
            baseline: Arc::clone(&self.baseline),
            project_id: project_id.to_string(),
            uploads,
        }
    }

    pub(super) fn reset_baseline(&mut self) {
        *self.baseline.lock() = FlatFileMap::new();
    }
}

/// One stateless round trip, owned so it can run in a spawned task.
pub(super) struct HttpRequest {
    authority: Arc<dyn CompileAuthority>,
    baseline: Arc<Mutex<FlatFileMap>>,
    project_id: String,
    uploads: Vec<(String, String)>,
}

impl HttpRequest {
    pub(super) fn uploads(&self) -> usize {
        self.uploads.len()
    }

    /// The answer to the last upload, or the snapshot if nothing changed.
    ///
    /// A compile error still stores the file, so the remaining paths are
    /// uploaded and the last answer reflects the whole project. Any other
    /// error stops the request with the rest unrecorded.
    pub(super) async fn run(self) -> Result<String, PreviewError> {
        let mut last = None;
        for (path, content) in self.uploads {
            let answer = self.authority.put_file(&self.project_id, &path, &content).await;
            if let Err(e) = &answer
                && !matches!(e, PreviewError::Compile(_))
            {
                return answer;
            }
            self.baseline.lock().insert(&path, content);
            last = Some(answer);
        }
        match last {
            Some(answer) => answer,
            None => self.authority.fetch_snapshot(&self.project_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use url::Url;

    #[derive(Default)]
    struct Recorder {
        puts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompileAuthority for Recorder {
        async fn fetch_snapshot(&self, _: &str) -> Result<String, PreviewError> {
            Ok("snapshot".into())
        }
        async fn put_file(&self, _: &str, path: &str, content: &str) -> Result<String, PreviewError> {
            self.puts.lock().push(path.to_string());
            if content.contains("{oops") {
                return Err(CompileError::Remote(format!("unterminated in {path}")).into());
            }
            if content == "unreachable" {
                return Err(TransportError::Connect("refused".into()).into());
            }
            Ok(format!("after {path}"))
        }
        async fn start_dev_server(&self, _: &str) -> Result<Url, PreviewError> {
            Ok(Url::parse("http://localhost:3000/").unwrap())
        }
    }

    fn remote() -> (RemoteTransport, crate::sync::RemoteEnd, Arc<Recorder>) {
        let (link, end) = RemoteLink::pair();
        let recorder = Arc::new(Recorder::default());
        let TransportStrategy::Remote(t) = TransportStrategy::remote(link, recorder.clone()) else {
            unreachable!()
        };
        (t, end, recorder)
    }

    fn files(pairs: &[(&str, &str)]) -> FlatFileMap {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_room_sends_only_the_delta() {
        let (mut t, mut end, _) = remote();
        let mut gate = SequenceGate::new();

        let v1 = files(&[("a.html", "1"), ("b.css", "x")]);
        assert_eq!(t.send_room(&v1, &mut gate).unwrap(), 2);

        let v2 = files(&[("a.html", "2")]);
        let seq = t.send_room(&v2, &mut gate).unwrap();
        assert_eq!(seq, 4);

        let mut sent = Vec::new();
        while let Ok(msg) = end.outgoing.try_recv() {
            sent.push(msg);
        }
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[2],
            SyncMessage::FileUpdated {
                seq: 3,
                path: "b.css".into(),
                content: String::new(),
                removed: true
            }
        );
        assert!(matches!(&sent[3], SyncMessage::FileUpdated { seq: 4, path, .. } if path == "a.html"));
    }

    #[tokio::test]
    async fn test_unchanged_files_request_a_refresh() {
        let (mut t, mut end, _) = remote();
        let mut gate = SequenceGate::new();
        let v = files(&[("a.html", "1")]);
        t.send_room(&v, &mut gate).unwrap();
        let seq = t.send_room(&v, &mut gate).unwrap();

        end.outgoing.try_recv().unwrap();
        assert_eq!(end.outgoing.try_recv().unwrap(), SyncMessage::RefreshRequested { seq });
    }

    #[tokio::test]
    async fn test_http_request_uploads_delta_then_returns_last_document() {
        let (t, _end, recorder) = remote();
        let v = files(&[("a.html", "1"), ("b.html", "2")]);
        let request = t.http_request("demo", &v);
        assert_eq!(request.uploads(), 2);
        assert_eq!(request.run().await.unwrap(), "after b.html");
        assert_eq!(recorder.puts.lock().len(), 2);

        let request = t.http_request("demo", &v);
        assert_eq!(request.uploads(), 0);
        assert_eq!(request.run().await.unwrap(), "snapshot");
    }

    #[tokio::test]
    async fn test_http_request_keeps_uploading_after_compile_error() {
        let (t, _end, recorder) = remote();
        let broken = files(&[("a.tsx", "{oops"), ("b.css", "x")]);
        assert_eq!(t.http_request("demo", &broken).run().await.unwrap(), "after b.css");
        assert_eq!(*recorder.puts.lock(), vec!["a.tsx", "b.css"]);

        let fixed = files(&[("a.tsx", "fixed"), ("b.css", "x")]);
        let request = t.http_request("demo", &fixed);
        assert_eq!(request.uploads(), 1);
        assert_eq!(request.run().await.unwrap(), "after a.tsx");
    }

    #[tokio::test]
    async fn test_http_request_reports_last_compile_error() {
        let (t, _end, _) = remote();
        let v = files(&[("a.tsx", "ok"), ("b.tsx", "{oops")]);
        let err = t.http_request("demo", &v).run().await.unwrap_err();
        assert!(matches!(err, PreviewError::Compile(CompileError::Remote(_))));
    }

    #[tokio::test]
    async fn test_failed_upload_is_not_recorded() {
        let (t, _end, recorder) = remote();
        let v = files(&[("a.html", "unreachable"), ("b.html", "2")]);
        let err = t.http_request("demo", &v).run().await.unwrap_err();
        assert!(err.is_recoverable_locally());
        assert_eq!(*recorder.puts.lock(), vec!["a.html"]);

        assert_eq!(t.http_request("demo", &v).uploads(), 2);
    }

    #[tokio::test]
    async fn test_closed_link_reports_one_disconnect() {
        let (link, end) = RemoteLink::pair();
        let mut transport = TransportStrategy::remote(link, Arc::new(Recorder::default()));
        drop(end);
        assert!(matches!(transport.next_event().await, SyncEvent::Disconnected(_)));
        let again = tokio::time::timeout(std::time::Duration::from_millis(10), transport.next_event());
        assert!(again.await.is_err());
    }
}
