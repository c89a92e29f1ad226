// commands.rs — Workspace command capability and bounded availability polls.
//
// The guest workspace exposes named commands (navigate the file browser,
// close every open view). Commands register asynchronously during startup,
// so they may not exist yet when the bridge needs them; callers poll for
// availability with a bounded budget and abandon the operation on timeout.

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::error::CommandError;

/// Navigate the workspace's file browser to a directory. Argument: the path.
pub const GO_TO_PATH: &str = "filebrowser:go-to-path";

/// Close every open editor surface in the workspace. No argument.
pub const CLOSE_ALL: &str = "application:close-all";

/// The guest workspace's command-execution capability.
#[async_trait]
pub trait WorkspaceCommands: Send + Sync {
    /// Whether a command is currently registered.
    async fn has_command(&self, name: &str) -> bool;

    /// Execute a registered command with an optional path argument.
    async fn execute(&self, name: &str, arg: Option<&str>) -> Result<(), CommandError>;
}

/// Poll until `name` is registered, at `config.poll_interval`, for at most
/// `config.max_poll_attempts` checks. Returns whether the command ended up
/// available; the caller abandons the operation (with an error log) if not.
pub async fn wait_for_command(
    commands: &dyn WorkspaceCommands,
    name: &str,
    config: &BridgeConfig,
) -> bool {
    for attempt in 0..config.max_poll_attempts {
        sleep(config.poll_interval).await;
        if commands.has_command(name).await {
            if attempt > 0 {
                debug!(command = name, attempts = attempt + 1, "command became available");
            }
            return true;
        }
    }
    commands.has_command(name).await
}

/// A [`WorkspaceCommands`] that accepts everything and only logs executions.
///
/// Used by the standalone daemon, which has no real workspace shell to
/// navigate; command effects there are purely informational.
pub struct LoggingCommands;

#[async_trait]
impl WorkspaceCommands for LoggingCommands {
    async fn has_command(&self, _name: &str) -> bool {
        true
    }

    async fn execute(&self, name: &str, arg: Option<&str>) -> Result<(), CommandError> {
        debug!(command = name, arg = arg.unwrap_or(""), "workspace command executed");
        Ok(())
    }
}
