//! Errifier daemon: owns the watch registry and serves it over a Unix socket.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod sink;

pub use error::DaemonError;
pub use protocol::{
    request_add, request_list, request_remove, request_status, request_stop, request_tail,
    request_toggle, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{run, start_blocking, DaemonState};
