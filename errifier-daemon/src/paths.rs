use std::path::{Path, PathBuf};

pub use errifier_core::config::errifier_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    errifier_root(home).join(DAEMON_SOCKET)
}
