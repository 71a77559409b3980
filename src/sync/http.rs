//! Stateless HTTP surface of a compile authority.
//!
//! Used for the session seed, the offline fallback and "open externally":
//!
//! ```text
//! GET  /preview/project/{id}/html   → full document
//! PUT  /preview/project/{id}/file   {filePath, content} → {html}
//! POST /devserver/start/{id}        → {url}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, CompileError, PreviewError, TransportError};

/// Request body of `PUT …/file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub file_path: String,
    pub content: String,
}

/// Response body of `PUT …/file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlResponse {
    pub html: String,
}

/// Response body of `POST /devserver/start/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevServerResponse {
    pub url: String,
}

/// Error body the authority answers failed compiles with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request/response access to a compile authority.
#[async_trait]
pub trait CompileAuthority: Send + Sync {
    /// Precomputed full document for the project.
    async fn fetch_snapshot(&self, project_id: &str) -> Result<String, PreviewError>;

    /// Store one file and return the recompiled document.
    async fn put_file(&self, project_id: &str, path: &str, content: &str) -> Result<String, PreviewError>;

    /// URL of a real dev server for the project.
    async fn start_dev_server(&self, project_id: &str) -> Result<Url, PreviewError>;
}

/// [`CompileAuthority`] over HTTP with bearer-token auth.
pub struct HttpAuthority {
    client: reqwest::Client,
    base: Url,
    token: String,
    timeout: Duration,
}

impl HttpAuthority {
    pub fn new(base: Url, token: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            base,
            token: token.into(),
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Connect(format!("bad endpoint {path}: {e}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, PreviewError> {
        let request = if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        };
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

#[async_trait]
impl CompileAuthority for HttpAuthority {
    async fn fetch_snapshot(&self, project_id: &str) -> Result<String, PreviewError> {
        let url = self.endpoint(&format!("preview/project/{}/html", encode(project_id)))?;
        let response = self.send(self.client.get(url)).await?;
        response.text().await.map_err(|e| decode_error(e).into())
    }

    async fn put_file(&self, project_id: &str, path: &str, content: &str) -> Result<String, PreviewError> {
        let url = self.endpoint(&format!("preview/project/{}/file", encode(project_id)))?;
        let body = FileUpdate {
            file_path: path.to_string(),
            content: content.to_string(),
        };
        let response = self.send(self.client.put(url).json(&body)).await?;
        let html: HtmlResponse = response.json().await.map_err(decode_error)?;
        Ok(html.html)
    }

    async fn start_dev_server(&self, project_id: &str) -> Result<Url, PreviewError> {
        let url = self.endpoint(&format!("devserver/start/{}", encode(project_id)))?;
        let response = self.send(self.client.post(url)).await?;
        let started: DevServerResponse = response.json().await.map_err(decode_error)?;
        Url::parse(&started.url)
            .map_err(|e| TransportError::Decode(format!("dev server url: {e}")).into())
    }
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string()
}

fn decode_error(e: reqwest::Error) -> TransportError {
    TransportError::Decode(e.to_string())
}

/// Map a non-success status to the failure it stands for.
fn status_error(status: StatusCode, body: String) -> PreviewError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthError::Rejected(body).into(),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            CompileError::Remote(message).into()
        }
        _ => TransportError::Http {
            status: status.as_u16(),
            body,
        }
        .into(),
    }
}
