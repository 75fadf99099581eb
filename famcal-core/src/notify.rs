//! Cross-component notification plumbing.
//!
//! `Notifier` is the user-facing toast sink owned by whatever front end is
//! running; `SyncEventBus` broadcasts refresh signals between independently
//! running parts (scheduler, drain loop, UI) the way the source system used
//! DOM custom events.

use tokio::sync::broadcast;

/// What a refresh signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    ICal,
    Notion,
    All,
    QueueDrained,
}

/// Broadcast payload emitted after every sync pass or queue drain.
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    pub kind: RefreshKind,
    /// Empty for aggregate signals.
    pub calendar_id: String,
    pub event_count: usize,
    pub success: bool,
    pub message: String,
}

impl RefreshSignal {
    pub fn calendar(
        kind: RefreshKind,
        calendar_id: &str,
        event_count: usize,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        RefreshSignal {
            kind,
            calendar_id: calendar_id.to_string(),
            event_count,
            success,
            message: message.into(),
        }
    }

    pub fn aggregate(kind: RefreshKind, success: bool, message: impl Into<String>) -> Self {
        RefreshSignal {
            kind,
            calendar_id: String::new(),
            event_count: 0,
            success,
            message: message.into(),
        }
    }
}

/// Broadcast channel for refresh signals. Cheap to clone; every clone shares
/// the same channel.
#[derive(Clone)]
pub struct SyncEventBus {
    tx: broadcast::Sender<RefreshSignal>,
}

impl SyncEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        SyncEventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshSignal> {
        self.tx.subscribe()
    }

    /// Lagging or absent receivers are fine; signals are advisory.
    pub fn emit(&self, signal: RefreshSignal) {
        let _ = self.tx.send(signal);
    }
}

impl Default for SyncEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// User-visible success/failure sink (the toast analog).
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str, is_error: bool);
}

/// Notifier that writes through the log; used by the CLI and the daemon.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str, is_error: bool) {
        if is_error {
            tracing::error!(title, "{}", message);
        } else {
            tracing::info!(title, "{}", message);
        }
    }
}
