// store.rs — FileStore trait and MemoryStore implementation.
//
// The FileStore trait is the bridge's only view of the guest workspace's
// storage: get/save/delete by `/`-separated path with typed entries plus a
// change-notification stream. The MVP implementation (MemoryStore) keeps
// everything in a BTreeMap and is what the daemon and the tests run on.
// The trait can be swapped for a real workspace backend without changing
// the rest of the system.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::paths;

/// Entry type in the guest store. Directories are structural; only files
/// carry content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A fully resolved store entry, as returned by [`FileStore::get`].
///
/// Directory entries list their immediate children without content, the
/// way a workspace contents API reports a directory model.
#[derive(Debug, Clone)]
pub enum StoreEntry {
    File { path: String, content: String },
    Directory { path: String, children: Vec<ChildEntry> },
}

/// A child reference inside a directory listing.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub path: String,
    pub kind: EntryKind,
}

/// What kind of mutation a change event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new entry appeared.
    Created,
    /// An entry's content was written (create-or-replace).
    Saved,
    /// An entry was removed.
    Deleted,
    /// An entry moved to a new path.
    Renamed,
}

/// The entry snapshot carried by a change event (absolute path, no content).
#[derive(Debug, Clone)]
pub struct ChangedEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl ChangedEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// One event on the store's unified change stream.
///
/// `old` is the entry before the mutation (deletes, renames), `new` the
/// entry after it (creates, saves, renames). Which sides are populated
/// depends on the kind; the watcher drops events missing the side it needs.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub old: Option<ChangedEntry>,
    pub new: Option<ChangedEntry>,
}

/// The guest workspace's storage capability.
///
/// All operations are asynchronous I/O against the backing store and may
/// suspend indefinitely; the bridge imposes no timeouts here.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Resolve the entry at `path`. The empty path is the store root and
    /// always resolves to a directory listing.
    async fn get(&self, path: &str) -> Result<StoreEntry, StoreError>;

    /// Create or overwrite a file with the given text content.
    async fn save_file(&self, path: &str, content: &str) -> Result<(), StoreError>;

    /// Create a directory entry. Overwriting an existing directory is a
    /// no-op at the protocol level; callers check existence first.
    async fn save_directory(&self, path: &str) -> Result<(), StoreError>;

    /// Remove the entry at `path` (and, for directories, everything under
    /// it). Fails with `NotFound` if nothing is there.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Subscribe to the store's change stream. Events are delivered in the
    /// order the store applied the mutations.
    fn subscribe(&self) -> broadcast::Receiver<FileChange>;
}

#[derive(Debug, Clone)]
enum Node {
    File(String),
    Directory,
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Node::File(_) => EntryKind::File,
            Node::Directory => EntryKind::Directory,
        }
    }
}

/// In-memory [`FileStore`] over a path-keyed map.
///
/// Keys are absolute `/`-separated paths; the root is implicit (the empty
/// path always lists top-level entries). Every mutation publishes one event
/// on the broadcast stream, in application order.
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Node>>,
    changes: broadcast::Sender<FileChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            entries: Mutex::new(BTreeMap::new()),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Node>> {
        // A poisoned map is still structurally valid; keep serving it.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, change: FileChange) {
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.changes.send(change);
    }

    fn children_of(entries: &BTreeMap<String, Node>, path: &str) -> Vec<ChildEntry> {
        entries
            .iter()
            .filter(|(child, _)| {
                if path.is_empty() {
                    !child.contains('/')
                } else {
                    paths::parent(child) == Some(path)
                }
            })
            .map(|(child, node)| ChildEntry {
                path: child.clone(),
                kind: node.kind(),
            })
            .collect()
    }

    /// Create a brand-new file, reporting it as a `Created` event rather
    /// than a `Saved` one. Mirrors a workspace's "new untitled file" path.
    pub async fn create_file(&self, path: &str, content: &str) -> Result<(), StoreError> {
        {
            let mut entries = self.lock();
            entries.insert(path.to_string(), Node::File(content.to_string()));
        }
        self.publish(FileChange {
            kind: ChangeKind::Created,
            old: None,
            new: Some(ChangedEntry::new(path, EntryKind::File)),
        });
        Ok(())
    }

    /// Create a brand-new directory, reporting it as a `Created` event.
    /// Structural creates are still protocol-visible; only `saved`
    /// handling excludes directories.
    pub async fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        {
            let mut entries = self.lock();
            entries.insert(path.to_string(), Node::Directory);
        }
        self.publish(FileChange {
            kind: ChangeKind::Created,
            old: None,
            new: Some(ChangedEntry::new(path, EntryKind::Directory)),
        });
        Ok(())
    }

    /// Move an entry (and its subtree, for directories) to a new path,
    /// reporting a single `Renamed` event for the entry itself.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let kind = {
            let mut entries = self.lock();
            let Some(node) = entries.remove(from) else {
                return Err(StoreError::NotFound {
                    path: from.to_string(),
                });
            };
            let kind = node.kind();
            if kind == EntryKind::Directory {
                let prefix = format!("{}/", from);
                let moved: Vec<(String, Node)> = entries
                    .iter()
                    .filter(|(path, _)| path.starts_with(&prefix))
                    .map(|(path, node)| (path.clone(), node.clone()))
                    .collect();
                for (path, node) in moved {
                    entries.remove(&path);
                    let rebased = format!("{}/{}", to, &path[prefix.len()..]);
                    entries.insert(rebased, node);
                }
            }
            entries.insert(to.to_string(), node);
            kind
        };
        self.publish(FileChange {
            kind: ChangeKind::Renamed,
            old: Some(ChangedEntry::new(from, kind)),
            new: Some(ChangedEntry::new(to, kind)),
        });
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<StoreEntry, StoreError> {
        let entries = self.lock();
        if path.is_empty() {
            return Ok(StoreEntry::Directory {
                path: String::new(),
                children: Self::children_of(&entries, path),
            });
        }
        match entries.get(path) {
            Some(Node::File(content)) => Ok(StoreEntry::File {
                path: path.to_string(),
                content: content.clone(),
            }),
            Some(Node::Directory) => Ok(StoreEntry::Directory {
                path: path.to_string(),
                children: Self::children_of(&entries, path),
            }),
            None => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn save_file(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let old = {
            let mut entries = self.lock();
            entries
                .insert(path.to_string(), Node::File(content.to_string()))
                .map(|node| ChangedEntry::new(path, node.kind()))
        };
        self.publish(FileChange {
            kind: ChangeKind::Saved,
            old,
            new: Some(ChangedEntry::new(path, EntryKind::File)),
        });
        Ok(())
    }

    async fn save_directory(&self, path: &str) -> Result<(), StoreError> {
        let old = {
            let mut entries = self.lock();
            entries
                .insert(path.to_string(), Node::Directory)
                .map(|node| ChangedEntry::new(path, node.kind()))
        };
        self.publish(FileChange {
            kind: ChangeKind::Saved,
            old,
            new: Some(ChangedEntry::new(path, EntryKind::Directory)),
        });
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let kind = {
            let mut entries = self.lock();
            let Some(node) = entries.remove(path) else {
                return Err(StoreError::NotFound {
                    path: path.to_string(),
                });
            };
            let kind = node.kind();
            if kind == EntryKind::Directory {
                let prefix = format!("{}/", path);
                entries.retain(|child, _| !child.starts_with(&prefix));
            }
            kind
        };
        self.publish(FileChange {
            kind: ChangeKind::Deleted,
            old: Some(ChangedEntry::new(path, kind)),
            new: None,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FileChange> {
        self.changes.subscribe()
    }
}
