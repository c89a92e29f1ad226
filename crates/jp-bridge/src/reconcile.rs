// reconcile.rs — Applying a host file set to the store, and exporting back.
//
// `apply_file_set` drives the store into agreement with the host's
// authoritative list: create/overwrite listed files, delete entries marked
// with null content, materialize missing directories along the way. Both
// operations are idempotent — applying the same set twice leaves the same
// exported state, and deleting what is already gone is a logged no-op.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, warn};

use jp_protocol::FiddleFile;

use crate::classify;
use crate::error::StoreError;
use crate::paths;
use crate::store::{ChildEntry, EntryKind, FileStore, StoreEntry};

/// Defensive cap on export recursion. Store hierarchies are acyclic by
/// construction, but the trait cannot promise that for every backend.
const MAX_EXPORT_DEPTH: u32 = 64;

/// Applies inbound file sets to the store and exports the session's files.
pub struct ReconciliationEngine<S> {
    store: Arc<S>,
}

impl<S: FileStore> ReconciliationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Materialize every missing directory on `path`'s ancestor chain,
    /// root first. An ancestor that already exists (or that fails the
    /// existence check for any other reason) is assumed present.
    pub async fn ensure_directory(&self, path: &str) -> Result<(), StoreError> {
        for ancestor in paths::ancestors(path) {
            match self.store.get(ancestor).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    debug!(path = ancestor, "creating directory");
                    self.store.save_directory(ancestor).await?;
                }
                Err(err) => {
                    warn!(path = ancestor, %err, "directory check failed, assuming it exists");
                }
            }
        }
        Ok(())
    }

    /// Apply a host-supplied file set under the given session root.
    ///
    /// Entries are applied in list order: `Some(content)` is a whole-file
    /// create-or-replace, `None` a best-effort delete. Parent directories
    /// of multi-segment paths are materialized before the write.
    pub async fn apply_file_set(&self, root: &str, files: &[FiddleFile]) -> Result<(), StoreError> {
        if !root.is_empty() {
            match self.store.get(root).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    debug!(path = root, "creating session root directory");
                    self.store.save_directory(root).await?;
                }
                Err(err) => {
                    warn!(path = root, %err, "session root check failed, assuming it exists");
                }
            }
        }

        for file in files {
            let absolute = paths::to_absolute(&file.path, root);
            if let Some(parent) = paths::parent(&absolute) {
                self.ensure_directory(parent).await?;
            }
            match &file.content {
                Some(content) => {
                    debug!(path = %absolute, "saving file");
                    self.store.save_file(&absolute, content).await?;
                }
                None => {
                    debug!(path = %absolute, "deleting file");
                    if let Err(err) = self.store.delete(&absolute).await {
                        // Deletion is idempotent at the protocol level; the
                        // entry being gone already is not a failure.
                        error!(path = %absolute, %err, "could not delete file");
                    }
                }
            }
        }

        Ok(())
    }

    /// Collect every text-eligible file under the session root.
    ///
    /// Returns `None` when a non-empty root's directory does not exist —
    /// "no session content yet", which the host must distinguish from an
    /// empty-but-present session.
    pub async fn export_file_set(&self, root: &str) -> Result<Option<Vec<FiddleFile>>, StoreError> {
        if !root.is_empty() && self.store.get(root).await.is_err() {
            return Ok(None);
        }

        let mut collected = Vec::new();
        self.collect_files(root, 0, &mut collected).await?;

        let files = collected
            .into_iter()
            .filter_map(|(absolute, content)| {
                paths::to_relative(&absolute, root).map(|relative| FiddleFile {
                    path: relative.to_string(),
                    content: Some(content),
                })
            })
            .collect();
        Ok(Some(files))
    }

    /// Recursive walk: recurse into directories, collect text-eligible file
    /// content, silently skip the rest. Boxed because async fns cannot
    /// recurse directly.
    fn collect_files<'a>(
        &'a self,
        path: &'a str,
        depth: u32,
        out: &'a mut Vec<(String, String)>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_EXPORT_DEPTH {
                warn!(path, depth, "export recursion depth cap reached, truncating walk");
                return Ok(());
            }
            match self.store.get(path).await? {
                StoreEntry::Directory { children, .. } => {
                    for ChildEntry { path: child, kind } in children {
                        match kind {
                            EntryKind::Directory => {
                                self.collect_files(&child, depth + 1, out).await?;
                            }
                            EntryKind::File => {
                                if !classify::is_text_path(&child) {
                                    debug!(path = %child, "ignoring non-text file");
                                    continue;
                                }
                                if let StoreEntry::File { content, .. } =
                                    self.store.get(&child).await?
                                {
                                    out.push((child, content));
                                }
                            }
                        }
                    }
                }
                StoreEntry::File { path, content } => {
                    if classify::is_text_path(&path) {
                        out.push((path, content));
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use crate::store::{ChangeKind, FileChange, MemoryStore};
    use jp_protocol::FiddleFile;

    fn engine() -> (ReconciliationEngine<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ReconciliationEngine::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn apply_creates_session_root_and_file() {
        let (engine, store) = engine();

        engine
            .apply_file_set("abc", &[FiddleFile::new("main.py", "print(1)")])
            .await
            .unwrap();

        match store.get("abc/main.py").await.unwrap() {
            StoreEntry::File { content, .. } => assert_eq!(content, "print(1)"),
            other => panic!("expected file, got {:?}", other),
        }
        assert!(matches!(
            store.get("abc").await.unwrap(),
            StoreEntry::Directory { .. }
        ));
    }

    #[tokio::test]
    async fn apply_materializes_directories_in_order() {
        let (engine, store) = engine();
        let mut changes = store.subscribe();

        engine
            .apply_file_set("", &[FiddleFile::new("sub/dir/f.txt", "x")])
            .await
            .unwrap();

        // sub, then sub/dir, then the file — top-down.
        let expected = [
            ("sub", ChangeKind::Saved),
            ("sub/dir", ChangeKind::Saved),
            ("sub/dir/f.txt", ChangeKind::Saved),
        ];
        for (path, kind) in expected {
            let event = changes.recv().await.unwrap();
            assert_eq!(event.kind, kind);
            assert_eq!(event.new.unwrap().path, path);
        }
    }

    #[tokio::test]
    async fn null_content_deletes_and_stays_quiet_when_absent() {
        let (engine, store) = engine();
        store.save_directory("proj").await.unwrap();
        store.save_file("proj/a.py", "old").await.unwrap();

        let payload = [FiddleFile::deletion("a.py")];
        engine.apply_file_set("proj", &payload).await.unwrap();
        assert!(store.get("proj/a.py").await.unwrap_err().is_not_found());

        // Second application: the file is already gone; no error surfaces.
        engine.apply_file_set("proj", &payload).await.unwrap();
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let (engine, _store) = engine();
        let payload = [
            FiddleFile::new("main.py", "print(1)"),
            FiddleFile::new("sub/util.py", "pass"),
        ];

        engine.apply_file_set("proj", &payload).await.unwrap();
        let first = engine.export_file_set("proj").await.unwrap();

        engine.apply_file_set("proj", &payload).await.unwrap();
        let second = engine.export_file_set("proj").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.unwrap().len(), 2);
    }

    /// Store whose existence checks fail opaquely instead of with a clean
    /// not-found; writes and reads of present entries still work.
    struct OpaqueChecks {
        inner: MemoryStore,
    }

    #[async_trait]
    impl FileStore for OpaqueChecks {
        async fn get(&self, path: &str) -> Result<StoreEntry, StoreError> {
            match self.inner.get(path).await {
                Err(err) if err.is_not_found() => Err(StoreError::Backend {
                    path: path.to_string(),
                    message: "listing temporarily unavailable".to_string(),
                }),
                other => other,
            }
        }

        async fn save_file(&self, path: &str, content: &str) -> Result<(), StoreError> {
            self.inner.save_file(path, content).await
        }

        async fn save_directory(&self, path: &str) -> Result<(), StoreError> {
            self.inner.save_directory(path).await
        }

        async fn delete(&self, path: &str) -> Result<(), StoreError> {
            self.inner.delete(path).await
        }

        fn subscribe(&self) -> broadcast::Receiver<FileChange> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn opaque_existence_errors_assume_directories_present() {
        let store = Arc::new(OpaqueChecks {
            inner: MemoryStore::new(),
        });
        let engine = ReconciliationEngine::new(Arc::clone(&store));

        engine
            .apply_file_set("proj", &[FiddleFile::new("sub/f.txt", "x")])
            .await
            .unwrap();

        // Neither the session root nor the parent chain was created — the
        // failed checks assumed presence — but the write went through.
        assert!(store.inner.get("proj").await.unwrap_err().is_not_found());
        assert!(store.inner.get("proj/sub").await.unwrap_err().is_not_found());
        match store.inner.get("proj/sub/f.txt").await.unwrap() {
            StoreEntry::File { content, .. } => assert_eq!(content, "x"),
            other => panic!("expected file, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn export_missing_root_is_none() {
        let (engine, _store) = engine();
        assert_eq!(engine.export_file_set("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn export_empty_root_directory_is_empty_list() {
        let (engine, store) = engine();
        store.save_directory("proj").await.unwrap();
        assert_eq!(
            engine.export_file_set("proj").await.unwrap(),
            Some(Vec::new())
        );
    }

    #[tokio::test]
    async fn export_recurses_and_maps_to_relative_paths() {
        let (engine, store) = engine();
        store.save_directory("proj").await.unwrap();
        store.save_directory("proj/sub").await.unwrap();
        store.save_file("proj/a.py", "a").await.unwrap();
        store.save_file("proj/sub/b.md", "b").await.unwrap();

        let files = engine.export_file_set("proj").await.unwrap().unwrap();
        let mut paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["a.py", "sub/b.md"]);
    }

    #[tokio::test]
    async fn export_omits_non_text_files() {
        let (engine, store) = engine();
        store.save_directory("proj").await.unwrap();
        store.save_file("proj/a.py", "a").await.unwrap();
        store.save_file("proj/image.png", "\u{fffd}").await.unwrap();

        let files = engine.export_file_set("proj").await.unwrap().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a.py");
    }

    #[tokio::test]
    async fn export_from_store_root_uses_identity_paths() {
        let (engine, store) = engine();
        store.save_file("top.txt", "t").await.unwrap();
        store.save_directory("sub").await.unwrap();
        store.save_file("sub/inner.md", "i").await.unwrap();

        let files = engine.export_file_set("").await.unwrap().unwrap();
        let mut paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["sub/inner.md", "top.txt"]);
    }
}
