//! # jp-protocol
//!
//! Wire messages exchanged between the embedding host (the page that owns
//! the authoritative fiddle) and the guest workspace this bridge runs in.
//!
//! The protocol is a pair of closed sum types, one per direction, carried
//! as JSON objects with a `type` tag. Tags and field names are part of the
//! host contract and must not change: the host matches on strings like
//! `set-fiddle-id` and `oldPath` exactly.
//!
//! Every `path` field on the wire is relative to the current session root.
//! Translation to and from the guest store's absolute paths happens in
//! `jp-bridge`, never here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One file in a fiddle, with a session-root-relative path.
///
/// In a `set-files` payload, `content: None` (JSON `null`) is a deletion
/// request for that path. In a `files` export, content is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiddleFile {
    /// Path relative to the session root, `/`-separated.
    pub path: String,

    /// Whole-file text content, or `None` to request deletion.
    pub content: Option<String>,
}

impl FiddleFile {
    /// Convenience constructor for a file with content.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
        }
    }

    /// Convenience constructor for a deletion entry (`content: null`).
    pub fn deletion(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: None,
        }
    }
}

/// Messages the host sends to the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// Establish or replace the session root. A missing or null `fiddleId`
    /// clears the session; an empty string means "the store root itself".
    #[serde(rename = "set-fiddle-id")]
    SetFiddleId {
        #[serde(rename = "fiddleId", default)]
        fiddle_id: Option<String>,
    },

    /// Push the authoritative file set. Entries with `content: null` are
    /// deletions; everything else is create-or-replace.
    #[serde(rename = "set-files")]
    SetFiles { files: Vec<FiddleFile> },

    /// Request a full export of the session's text files.
    #[serde(rename = "get-files")]
    GetFiles,

    /// Any `type` tag this version does not recognize. Ignored by the
    /// dispatcher so the protocol can grow without breaking old guests.
    #[serde(other)]
    Unknown,
}

/// Messages the guest sends to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GuestMessage {
    /// Posted exactly once when the bridge activates.
    #[serde(rename = "jpfiddle-extension-ready")]
    Ready,

    /// A text file was created or overwritten in the session.
    #[serde(rename = "file-saved")]
    FileSaved { path: String, content: String },

    /// A file or directory was removed.
    #[serde(rename = "file-deleted")]
    FileDeleted { path: String },

    /// A file or directory was moved within the session.
    #[serde(rename = "file-renamed")]
    FileRenamed {
        #[serde(rename = "oldPath")]
        old_path: String,
        #[serde(rename = "newPath")]
        new_path: String,
    },

    /// A new file or directory appeared.
    #[serde(rename = "file-created")]
    FileCreated { path: String },

    /// Full export of the session's text files. `files: null` means the
    /// session directory does not exist yet, as opposed to an empty list
    /// meaning the session exists but holds nothing exportable.
    #[serde(rename = "files")]
    Files { files: Option<Vec<FiddleFile>> },
}

impl fmt::Display for GuestMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestMessage::Ready => write!(f, "ready"),
            GuestMessage::FileSaved { path, content } => {
                write!(f, "file-saved {} ({} bytes)", path, content.len())
            }
            GuestMessage::FileDeleted { path } => write!(f, "file-deleted {}", path),
            GuestMessage::FileRenamed { old_path, new_path } => {
                write!(f, "file-renamed {} -> {}", old_path, new_path)
            }
            GuestMessage::FileCreated { path } => write!(f, "file-created {}", path),
            GuestMessage::Files { files: Some(files) } => {
                write!(f, "files ({} entries)", files.len())
            }
            GuestMessage::Files { files: None } => write!(f, "files (no session directory)"),
        }
    }
}
