// watcher.rs — Classifies store change events into outbound host messages.
//
// One watcher subscribes to the store's change stream for the life of the
// process. Each event yields at most one outbound message, posted
// immediately, preserving the store's own ordering — no batching, no
// debouncing. Events outside the current session root are dropped.
//
// Directory entries are excluded from `saved` handling (structural, not
// content-bearing at the protocol boundary) but still reported on create,
// delete, and rename so the host can mirror structural changes.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, warn};

use jp_protocol::GuestMessage;

use crate::paths;
use crate::store::{ChangeKind, ChangedEntry, EntryKind, FileChange, FileStore, StoreEntry};

/// Turns guest store mutations into `file-*` messages for the host.
pub struct FileStoreWatcher<S> {
    store: Arc<S>,
    session_root: watch::Receiver<Option<String>>,
    outbound: mpsc::UnboundedSender<GuestMessage>,
    changes: broadcast::Receiver<FileChange>,
}

impl<S: FileStore> FileStoreWatcher<S> {
    /// Subscribe to the store's change stream. Subscription happens here,
    /// not in [`run`], so no event between construction and task startup
    /// is lost.
    pub fn new(
        store: Arc<S>,
        session_root: watch::Receiver<Option<String>>,
        outbound: mpsc::UnboundedSender<GuestMessage>,
    ) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            session_root,
            outbound,
            changes,
        }
    }

    /// Consume the change stream until either the store drops its sender
    /// or the session controller (the root's owner) goes away.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                result = self.changes.recv() => match result {
                    Ok(change) => self.handle_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "change stream lagged, events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("change stream closed, watcher stopping");
                        break;
                    }
                },
                result = self.session_root.changed() => {
                    if result.is_err() {
                        debug!("session controller gone, watcher stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn handle_change(&mut self, change: FileChange) {
        let root = self.session_root.borrow().clone();
        let Some(root) = root else {
            error!("file change before a session root was established, dropping event");
            return;
        };

        if let Some(message) = self.classify(&change, &root).await {
            if self.outbound.send(message).is_err() {
                debug!("outbound channel closed, dropping message");
            }
        }
    }

    /// Map one change event to its outbound message, or `None` to drop it.
    async fn classify(&self, change: &FileChange, root: &str) -> Option<GuestMessage> {
        match change.kind {
            ChangeKind::Saved => {
                let new = self.require_entry(change.new.as_ref())?;
                if new.kind == EntryKind::Directory {
                    return None;
                }
                let relative = self.require_in_scope(&new.path, root)?;
                // Fetch the content fresh; the event itself carries none.
                match self.store.get(&new.path).await {
                    Ok(StoreEntry::File { content, .. }) => Some(GuestMessage::FileSaved {
                        path: relative.to_string(),
                        content,
                    }),
                    Ok(StoreEntry::Directory { .. }) => None,
                    Err(err) => {
                        error!(path = %new.path, %err, "could not read saved file, dropping event");
                        None
                    }
                }
            }
            ChangeKind::Deleted => {
                let old = self.require_entry(change.old.as_ref())?;
                let relative = self.require_in_scope(&old.path, root)?;
                Some(GuestMessage::FileDeleted {
                    path: relative.to_string(),
                })
            }
            ChangeKind::Renamed => {
                let old = self.require_entry(change.old.as_ref())?;
                let new = self.require_entry(change.new.as_ref())?;
                // Both sides must be in scope; a half-in-scope rename is
                // dropped entirely rather than reported partially.
                let old_relative = self.require_in_scope(&old.path, root)?;
                let new_relative = self.require_in_scope(&new.path, root)?;
                Some(GuestMessage::FileRenamed {
                    old_path: old_relative.to_string(),
                    new_path: new_relative.to_string(),
                })
            }
            ChangeKind::Created => {
                let new = self.require_entry(change.new.as_ref())?;
                let relative = self.require_in_scope(&new.path, root)?;
                Some(GuestMessage::FileCreated {
                    path: relative.to_string(),
                })
            }
        }
    }

    fn require_entry<'a>(&self, entry: Option<&'a ChangedEntry>) -> Option<&'a ChangedEntry> {
        if entry.is_none() {
            warn!("change event carried no usable entry, dropping");
        }
        entry
    }

    fn require_in_scope<'a>(&self, path: &'a str, root: &str) -> Option<&'a str> {
        let relative = paths::to_relative(path, root);
        if relative.is_none() {
            warn!(path, root, "path outside the session root, dropping event");
        }
        relative
    }
}
