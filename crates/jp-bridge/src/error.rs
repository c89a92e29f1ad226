// error.rs — Error types for the bridge's capability seams.

use thiserror::Error;

/// Errors from the guest file-store capability.
///
/// `NotFound` is load-bearing: reconciliation treats it as "safe to create"
/// during directory materialization and as an expected no-op when deleting.
/// Every other failure is backend-specific and reported as `Backend`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entry exists at the given path.
    #[error("no entry at '{path}'")]
    NotFound { path: String },

    /// The backing store failed in some other way.
    #[error("store backend error at '{path}': {message}")]
    Backend { path: String, message: String },
}

impl StoreError {
    /// True if this error means the path simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors from the workspace command capability.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command is not registered with the workspace.
    #[error("command '{command}' is not available")]
    Unavailable { command: String },

    /// The command was registered but its execution failed.
    #[error("command '{command}' failed: {message}")]
    Failed { command: String, message: String },
}
