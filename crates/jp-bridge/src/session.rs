// session.rs — Session root ownership and inbound message dispatch.
//
// The SessionController is the single owner of the session root. Inbound
// host messages are serialized through one ordered queue with the
// controller as the only consumer, so root updates and reconciliation
// never race each other. The watcher observes the root through a watch
// channel and never writes it.
//
// The root is never torn down: a new `set-fiddle-id` simply overwrites it,
// and the previous session's directory stays in the store, unwatched.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use jp_protocol::{FiddleFile, GuestMessage, HostMessage};

use crate::commands::{self, WorkspaceCommands, CLOSE_ALL, GO_TO_PATH};
use crate::config::BridgeConfig;
use crate::reconcile::ReconciliationEngine;
use crate::store::FileStore;
use crate::watcher::FileStoreWatcher;

/// The channel endpoints a transport uses to talk to a running bridge.
///
/// Push decoded host messages into `host_tx`; forward everything arriving
/// on `guest_rx` to the host. Dropping `host_tx` stops the controller.
pub struct BridgeHandle {
    pub host_tx: mpsc::UnboundedSender<HostMessage>,
    pub guest_rx: mpsc::UnboundedReceiver<GuestMessage>,
}

/// Wire up a controller and a watcher over the given capabilities and
/// spawn both as tasks. Posts `jpfiddle-extension-ready` immediately.
pub fn spawn<S, C>(store: Arc<S>, workspace: Arc<C>, config: BridgeConfig) -> BridgeHandle
where
    S: FileStore + 'static,
    C: WorkspaceCommands + 'static,
{
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let (guest_tx, guest_rx) = mpsc::unbounded_channel();
    let (root_tx, root_rx) = watch::channel(None);

    let watcher = FileStoreWatcher::new(Arc::clone(&store), root_rx, guest_tx.clone());
    tokio::spawn(watcher.run());

    let controller = SessionController {
        engine: ReconciliationEngine::new(store),
        workspace,
        config,
        outbound: guest_tx,
        inbound: host_rx,
        root: None,
        root_tx,
    };
    tokio::spawn(controller.run());

    BridgeHandle { host_tx, guest_rx }
}

/// Top-level dispatch loop: routes inbound host messages to the
/// reconciliation engine and the workspace command capability.
struct SessionController<S, C> {
    engine: ReconciliationEngine<S>,
    workspace: Arc<C>,
    config: BridgeConfig,
    outbound: mpsc::UnboundedSender<GuestMessage>,
    inbound: mpsc::UnboundedReceiver<HostMessage>,
    root: Option<String>,
    root_tx: watch::Sender<Option<String>>,
}

impl<S, C> SessionController<S, C>
where
    S: FileStore + 'static,
    C: WorkspaceCommands + 'static,
{
    async fn run(mut self) {
        // Announce the bridge unconditionally, before any session exists.
        let _ = self.outbound.send(GuestMessage::Ready);
        info!("bridge active, ready message posted");

        while let Some(message) = self.inbound.recv().await {
            self.handle_message(message).await;
        }
        debug!("inbound channel closed, controller stopping");
    }

    async fn handle_message(&mut self, message: HostMessage) {
        match message {
            HostMessage::SetFiddleId { fiddle_id } => self.set_fiddle_id(fiddle_id),
            HostMessage::SetFiles { files } => self.set_files(&files).await,
            HostMessage::GetFiles => self.get_files().await,
            HostMessage::Unknown => {
                debug!("ignoring unrecognized host message");
            }
        }
    }

    fn set_fiddle_id(&mut self, fiddle_id: Option<String>) {
        info!(fiddle_id = fiddle_id.as_deref().unwrap_or("<none>"), "session root set");
        self.root = fiddle_id;
        let _ = self.root_tx.send(self.root.clone());

        if let Some(root) = self.root.clone() {
            self.spawn_navigate(root);
        }
    }

    async fn set_files(&mut self, files: &[FiddleFile]) {
        let Some(root) = self.root.clone() else {
            error!("set-files received before a session root was established");
            return;
        };

        if let Err(err) = self.engine.apply_file_set(&root, files).await {
            error!(%err, "applying host file set failed");
            return;
        }

        // The file set may have just materialized the session directory,
        // so navigate (again) and clear open editors. Both poll for their
        // command and must not hold up the acknowledgement below.
        self.spawn_navigate(root.clone());
        self.spawn_close_all();

        self.export(&root).await;
    }

    async fn get_files(&mut self) {
        let Some(root) = self.root.clone() else {
            error!("get-files received before a session root was established");
            return;
        };
        self.export(&root).await;
    }

    /// Export the session's files and post the `files` message. This is
    /// both the `get-files` response and the `set-files` round-trip
    /// acknowledgement; the host tells them apart by arrival order only.
    async fn export(&mut self, root: &str) {
        match self.engine.export_file_set(root).await {
            Ok(files) => {
                let _ = self.outbound.send(GuestMessage::Files { files });
            }
            Err(err) => error!(%err, "exporting session files failed"),
        }
    }

    fn spawn_navigate(&self, root: String) {
        let workspace = Arc::clone(&self.workspace);
        let config = self.config.clone();
        tokio::spawn(async move {
            if !commands::wait_for_command(&*workspace, GO_TO_PATH, &config).await {
                error!(command = GO_TO_PATH, "command never became available, giving up");
                return;
            }
            if let Err(err) = workspace.execute(GO_TO_PATH, Some(&root)).await {
                error!(%err, "file browser navigation failed");
            }
        });
    }

    fn spawn_close_all(&self) {
        let workspace = Arc::clone(&self.workspace);
        let config = self.config.clone();
        tokio::spawn(async move {
            if !commands::wait_for_command(&*workspace, CLOSE_ALL, &config).await {
                error!(command = CLOSE_ALL, "command never became available, giving up");
                return;
            }
            if let Err(err) = workspace.execute(CLOSE_ALL, None).await {
                error!(%err, "closing open editors failed");
            }
        });
    }
}
