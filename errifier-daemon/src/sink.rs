//! Notification sinks wired up by the daemon.

use std::sync::Arc;

use errifier_core::{FanoutSink, NotificationSink, TracingSink, WatchConfig};

#[cfg(feature = "desktop")]
pub use desktop::DesktopSink;

/// Sinks for a running daemon: always the log, plus the desktop when enabled.
pub fn daemon_sink(config: &WatchConfig) -> Arc<dyn NotificationSink> {
    let sink = FanoutSink::new().with(Arc::new(TracingSink));
    if config.desktop_notifications {
        Arc::new(with_desktop(sink))
    } else {
        Arc::new(sink)
    }
}

#[cfg(feature = "desktop")]
fn with_desktop(sink: FanoutSink) -> FanoutSink {
    sink.with(Arc::new(DesktopSink::default()))
}

#[cfg(not(feature = "desktop"))]
fn with_desktop(sink: FanoutSink) -> FanoutSink {
    tracing::warn!("desktop notifications requested but this build lacks the `desktop` feature");
    sink
}

#[cfg(feature = "desktop")]
mod desktop {
    use errifier_core::{Notification, NotificationSink};

    const DEFAULT_TIMEOUT_MS: u32 = 5_000;

    /// Shows each notification as a native desktop popup.
    ///
    /// Delivery can block on the session bus, so inside a runtime it is moved
    /// to the blocking pool and the watcher task never waits on it.
    #[derive(Debug, Clone)]
    pub struct DesktopSink {
        timeout_ms: u32,
    }

    impl DesktopSink {
        pub fn new(timeout_ms: u32) -> Self {
            Self { timeout_ms }
        }
    }

    impl Default for DesktopSink {
        fn default() -> Self {
            Self::new(DEFAULT_TIMEOUT_MS)
        }
    }

    impl NotificationSink for DesktopSink {
        fn notify(&self, notification: &Notification) {
            let notification = notification.clone();
            let timeout_ms = self.timeout_ms;
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(move || deliver(&notification, timeout_ms));
                }
                Err(_) => deliver(&notification, timeout_ms),
            }
        }
    }

    fn deliver(notification: &Notification, timeout_ms: u32) {
        if let Err(err) = notify_rust::Notification::new()
            .summary(&notification.title)
            .body(&notification.message)
            .timeout(notify_rust::Timeout::Milliseconds(timeout_ms))
            .show()
        {
            tracing::warn!(
                title = %notification.title,
                error = %err,
                "failed to show desktop notification",
            );
        }
    }
}
