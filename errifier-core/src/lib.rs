//! Errifier core library: watch registry, watcher tasks, tail reader.
//!
//! Public API surface:
//! - [`registry`]: [`WatchRegistry`] (add / toggle / describe / remove / shutdown)
//! - [`source`]: [`EventSource`] seam and the `notify`-backed [`NotifyEventSource`]
//! - [`sink`]: [`NotificationSink`] seam and in-process sinks
//! - [`tail`]: last-N-lines reader
//! - [`config`]: [`WatchConfig`]
//! - [`types`], [`error`]

pub mod config;
pub mod error;
pub mod registry;
pub mod sink;
pub mod source;
pub mod tail;
pub mod types;
mod watcher;

pub use config::WatchConfig;
pub use error::{
    AddError, ConfigError, DuplicateField, EventSourceError, TailError, ToggleError,
};
pub use registry::WatchRegistry;
pub use sink::{ChannelSink, FanoutSink, NotificationSink, TracingSink};
pub use source::{EventFeed, EventSource, EventStream, NotifyEventSource};
pub use tail::{tail, tail_async};
pub use types::{ChangeEvent, ChangeKind, EntryId, Notification, WatchSnapshot, WatchState};
