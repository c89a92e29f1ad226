//! # jp-bridge
//!
//! Synchronizes a guest workspace's file tree with an embedding host.
//!
//! The host owns the authoritative file set for one fiddle; the guest is a
//! transient workspace driven into agreement with whatever the host last
//! sent, and every local mutation is reported back. All host state flows
//! through the [`jp_protocol`] message types; all guest state flows through
//! two narrow capability traits.
//!
//! ## Key components
//!
//! - [`session::spawn`] — wires a controller and watcher over a store and
//!   a command capability, returning the channel endpoints for a transport.
//! - [`store::FileStore`] — the guest's storage capability (get/save/delete
//!   plus a change stream). [`store::MemoryStore`] is the in-tree backend.
//! - [`reconcile::ReconciliationEngine`] — applies inbound file sets
//!   idempotently and exports the session's text files.
//! - [`watcher::FileStoreWatcher`] — turns store change events into
//!   outbound `file-*` messages, scoped to the session root.
//! - [`commands::WorkspaceCommands`] — navigation / close-all capability
//!   with bounded availability polling.

pub mod classify;
pub mod commands;
pub mod config;
pub mod error;
pub mod paths;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod watcher;

pub use commands::{LoggingCommands, WorkspaceCommands};
pub use config::BridgeConfig;
pub use error::{CommandError, StoreError};
pub use reconcile::ReconciliationEngine;
pub use session::{spawn, BridgeHandle};
pub use store::{FileStore, MemoryStore};
