// bridge_flow.rs — End-to-end bridge scenarios over the in-memory store.
//
// Drives a spawned bridge the way the embedding host would: push
// HostMessages in, read GuestMessages out, and inspect the store and the
// recorded workspace commands afterwards.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use jp_bridge::commands::{WorkspaceCommands, CLOSE_ALL, GO_TO_PATH};
use jp_bridge::error::CommandError;
use jp_bridge::store::{FileStore, MemoryStore, StoreEntry};
use jp_bridge::{session, BridgeConfig};
use jp_protocol::{FiddleFile, GuestMessage, HostMessage};

/// Workspace command capability that records every execution.
#[derive(Default)]
struct RecordingCommands {
    executed: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingCommands {
    fn executions(&self) -> Vec<(String, Option<String>)> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl WorkspaceCommands for RecordingCommands {
    async fn has_command(&self, _name: &str) -> bool {
        true
    }

    async fn execute(&self, name: &str, arg: Option<&str>) -> Result<(), CommandError> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name.to_string(), arg.map(String::from)));
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    workspace: Arc<RecordingCommands>,
    host_tx: mpsc::UnboundedSender<HostMessage>,
    guest_rx: mpsc::UnboundedReceiver<GuestMessage>,
}

fn spawn_bridge() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let workspace = Arc::new(RecordingCommands::default());
    let config = BridgeConfig {
        poll_interval: Duration::from_millis(1),
        max_poll_attempts: 10,
    };
    let handle = session::spawn(Arc::clone(&store), Arc::clone(&workspace), config);
    Harness {
        store,
        workspace,
        host_tx: handle.host_tx,
        guest_rx: handle.guest_rx,
    }
}

async fn next_message(harness: &mut Harness) -> GuestMessage {
    timeout(Duration::from_secs(2), harness.guest_rx.recv())
        .await
        .expect("timed out waiting for guest message")
        .expect("guest channel closed")
}

/// Skip past file-event echoes until the next `files` message. The watcher
/// reports the bridge's own reconciliation writes, and those echoes
/// interleave with the acknowledgement in no guaranteed order.
async fn next_files_message(harness: &mut Harness) -> Option<Vec<FiddleFile>> {
    loop {
        if let GuestMessage::Files { files } = next_message(harness).await {
            return files;
        }
    }
}

async fn wait_for_execution(harness: &Harness, command: &str, arg: Option<&str>) {
    let want = (command.to_string(), arg.map(String::from));
    for _ in 0..200 {
        if harness.workspace.executions().contains(&want) {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("command {:?} was never executed", want);
}

#[tokio::test]
async fn ready_is_posted_first() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);
}

#[tokio::test]
async fn set_fiddle_id_then_set_files_round_trip() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);

    harness
        .host_tx
        .send(HostMessage::SetFiddleId {
            fiddle_id: Some("abc".to_string()),
        })
        .unwrap();
    harness
        .host_tx
        .send(HostMessage::SetFiles {
            files: vec![FiddleFile::new("main.py", "print(1)")],
        })
        .unwrap();

    // Round-trip acknowledgement carries the applied state.
    let files = next_files_message(&mut harness).await.unwrap();
    assert_eq!(files, vec![FiddleFile::new("main.py", "print(1)")]);

    // The file landed under the session root.
    match harness.store.get("abc/main.py").await.unwrap() {
        StoreEntry::File { content, .. } => assert_eq!(content, "print(1)"),
        other => panic!("expected file, got {:?}", other),
    }

    // The workspace navigated to the session root and closed open editors.
    wait_for_execution(&harness, GO_TO_PATH, Some("abc")).await;
    wait_for_execution(&harness, CLOSE_ALL, None).await;
}

#[tokio::test]
async fn get_files_before_any_content_reports_null() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);

    harness
        .host_tx
        .send(HostMessage::SetFiddleId {
            fiddle_id: Some("missing".to_string()),
        })
        .unwrap();
    harness.host_tx.send(HostMessage::GetFiles).unwrap();

    assert_eq!(next_files_message(&mut harness).await, None);
}

#[tokio::test]
async fn set_files_without_session_is_silently_dropped() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);

    harness
        .host_tx
        .send(HostMessage::SetFiles {
            files: vec![FiddleFile::new("main.py", "print(1)")],
        })
        .unwrap();

    // The drop produces no acknowledgement and no error message. A
    // subsequent valid exchange is the only thing the host ever sees.
    harness
        .host_tx
        .send(HostMessage::SetFiddleId {
            fiddle_id: Some("late".to_string()),
        })
        .unwrap();
    harness.host_tx.send(HostMessage::GetFiles).unwrap();

    assert_eq!(next_files_message(&mut harness).await, None);
    assert!(harness.store.get("main.py").await.is_err());
}

#[tokio::test]
async fn reapplying_the_same_payload_acknowledges_identically() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);

    let payload = vec![
        FiddleFile::new("main.py", "print(1)"),
        FiddleFile::new("sub/util.py", "pass"),
    ];
    harness
        .host_tx
        .send(HostMessage::SetFiddleId {
            fiddle_id: Some("proj".to_string()),
        })
        .unwrap();

    harness
        .host_tx
        .send(HostMessage::SetFiles {
            files: payload.clone(),
        })
        .unwrap();
    let mut first = next_files_message(&mut harness).await.unwrap();

    harness
        .host_tx
        .send(HostMessage::SetFiles {
            files: payload.clone(),
        })
        .unwrap();
    let mut second = next_files_message(&mut harness).await.unwrap();

    first.sort_by(|a, b| a.path.cmp(&b.path));
    second.sort_by(|a, b| a.path.cmp(&b.path));
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn deletion_payload_removes_file_and_acknowledges() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);

    harness
        .host_tx
        .send(HostMessage::SetFiddleId {
            fiddle_id: Some("proj".to_string()),
        })
        .unwrap();
    harness
        .host_tx
        .send(HostMessage::SetFiles {
            files: vec![FiddleFile::new("a.py", "old")],
        })
        .unwrap();
    assert_eq!(
        next_files_message(&mut harness).await.unwrap(),
        vec![FiddleFile::new("a.py", "old")]
    );

    // Delete it, then delete it again: both acknowledge an empty session.
    for _ in 0..2 {
        harness
            .host_tx
            .send(HostMessage::SetFiles {
                files: vec![FiddleFile::deletion("a.py")],
            })
            .unwrap();
        assert_eq!(next_files_message(&mut harness).await, Some(vec![]));
    }
    assert!(harness.store.get("proj/a.py").await.is_err());
}

#[tokio::test]
async fn unknown_messages_are_ignored() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);

    harness.host_tx.send(HostMessage::Unknown).unwrap();
    harness
        .host_tx
        .send(HostMessage::SetFiddleId {
            fiddle_id: Some("proj".to_string()),
        })
        .unwrap();
    harness.host_tx.send(HostMessage::GetFiles).unwrap();

    // The unknown message produced nothing; the export is the next reply.
    assert_eq!(next_files_message(&mut harness).await, None);
}

#[tokio::test]
async fn local_edits_after_reconciliation_are_reported() {
    let mut harness = spawn_bridge();
    assert_eq!(next_message(&mut harness).await, GuestMessage::Ready);

    harness
        .host_tx
        .send(HostMessage::SetFiddleId {
            fiddle_id: Some("proj".to_string()),
        })
        .unwrap();
    harness
        .host_tx
        .send(HostMessage::SetFiles {
            files: vec![FiddleFile::new("main.py", "print(1)")],
        })
        .unwrap();
    let _ = next_files_message(&mut harness).await;

    // A guest-side edit must reach the host as a file-saved message.
    harness
        .store
        .save_file("proj/main.py", "print(2)")
        .await
        .unwrap();

    loop {
        match next_message(&mut harness).await {
            GuestMessage::FileSaved { path, content } if content == "print(2)" => {
                assert_eq!(path, "main.py");
                break;
            }
            _ => continue,
        }
    }
}
