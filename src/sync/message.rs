//! Room protocol messages.
//!
//! JSON text frames over the WebSocket, tagged by `type`:
//!
//! | `type`            | Direction        | Payload                                  |
//! |-------------------|------------------|------------------------------------------|
//! | `join-project`    | client → server  | `projectId`, `userId`, `token`           |
//! | `joined-project`  | server → client  | `projectId`                              |
//! | `join-rejected`   | server → client  | `reason`                                 |
//! | `update-file`     | client → server  | `seq`, `projectId`, `filePath`, `content`, `removed` |
//! | `refresh-preview` | client → server  | `seq`, `projectId`                       |
//! | `preview-updated` | server → client  | `seq?`, `html`, `filePath?`              |
//! | `preview-error`   | server → client  | `seq?`, `error`, `filePath?`             |
//!
//! `seq` is issued by the client and echoed unchanged by the server. A
//! `preview-updated` without `seq` is a push caused by another room member.

use serde::{Deserialize, Serialize};

use super::sequence::Seq;

/// One frame of the room protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WireMessage {
    JoinProject {
        project_id: String,
        user_id: String,
        token: String,
    },

    JoinedProject {
        project_id: String,
    },

    JoinRejected {
        reason: String,
    },

    UpdateFile {
        seq: Seq,
        project_id: String,
        file_path: String,
        content: String,
        #[serde(default, skip_serializing_if = "is_false")]
        removed: bool,
    },

    RefreshPreview {
        seq: Seq,
        project_id: String,
    },

    PreviewUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<Seq>,
        html: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    PreviewError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<Seq>,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl WireMessage {
    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        // all fields are strings, integers and bools
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }

    /// Sequence id this frame answers or carries, if any.
    pub fn seq(&self) -> Option<Seq> {
        match self {
            Self::UpdateFile { seq, .. } | Self::RefreshPreview { seq, .. } => Some(*seq),
            Self::PreviewUpdated { seq, .. } | Self::PreviewError { seq, .. } => *seq,
            _ => None,
        }
    }
}

/// Logical messages exchanged with a compile authority.
///
/// Requests carry the sequence id they were issued under; responses carry
/// the id they answer (`None` for pushes nobody on this side asked for).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    FileUpdated {
        seq: Seq,
        path: String,
        content: String,
        removed: bool,
    },
    RefreshRequested {
        seq: Seq,
    },
    DocumentReady {
        seq: Option<Seq>,
        html: String,
        path: Option<String>,
    },
    CompileFailed {
        seq: Option<Seq>,
        error: String,
        path: Option<String>,
    },
}

impl SyncMessage {
    /// Wire frame for this message within `project_id`'s room.
    pub fn into_wire(self, project_id: &str) -> WireMessage {
        match self {
            Self::FileUpdated {
                seq,
                path,
                content,
                removed,
            } => WireMessage::UpdateFile {
                seq,
                project_id: project_id.to_string(),
                file_path: path,
                content,
                removed,
            },
            Self::RefreshRequested { seq } => WireMessage::RefreshPreview {
                seq,
                project_id: project_id.to_string(),
            },
            Self::DocumentReady { seq, html, path } => WireMessage::PreviewUpdated {
                seq,
                html,
                file_path: path,
            },
            Self::CompileFailed { seq, error, path } => WireMessage::PreviewError {
                seq,
                error,
                file_path: path,
            },
        }
    }

    /// Logical message for a content frame; session frames map to `None`.
    pub fn from_wire(wire: WireMessage) -> Option<Self> {
        Some(match wire {
            WireMessage::UpdateFile {
                seq,
                file_path,
                content,
                removed,
                ..
            } => Self::FileUpdated {
                seq,
                path: file_path,
                content,
                removed,
            },
            WireMessage::RefreshPreview { seq, .. } => Self::RefreshRequested { seq },
            WireMessage::PreviewUpdated {
                seq,
                html,
                file_path,
            } => Self::DocumentReady {
                seq,
                html,
                path: file_path,
            },
            WireMessage::PreviewError {
                seq,
                error,
                file_path,
            } => Self::CompileFailed {
                seq,
                error,
                path: file_path,
            },
            WireMessage::JoinProject { .. }
            | WireMessage::JoinedProject { .. }
            | WireMessage::JoinRejected { .. } => return None,
        })
    }
}
