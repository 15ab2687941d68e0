use std::path::{Path, PathBuf};

use relay_core::config::relay_root;

pub const DAEMON_LABEL: &str = "dev.webdav-sync.relay";

pub const DAEMON_SOCKET: &str = "relay.sock";
pub const HANDLER_SOCKET: &str = "handler.sock";

/// Socket trigger sources connect to.
pub fn socket_path(home: &Path) -> PathBuf {
    relay_root(home).join(DAEMON_SOCKET)
}

/// Socket the managed application listens on once it has initialized.
pub fn handler_socket_path(home: &Path) -> PathBuf {
    relay_root(home).join(HANDLER_SOCKET)
}
