//! Notification sinks.
//!
//! A sink is fire-and-forget: the watcher never waits on delivery and never
//! looks at an outcome. Implementations that can block (desktop buses,
//! webhooks) must hand the work off themselves.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::types::Notification;

pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: &Notification);
}

/// Emits every notification as a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: &Notification) {
        tracing::warn!(
            title = %notification.title,
            "{}",
            notification.message
        );
    }
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: &Notification) {
        if self.tx.send(notification.clone()).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

/// Delivers to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, notification: &Notification) {
        for sink in &self.sinks {
            sink.notify(notification);
        }
    }
}
