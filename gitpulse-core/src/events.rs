use tokio::sync::broadcast;
use tracing::debug;

/// Closed set of observable pipeline events.
///
/// Subscribers receive every variant; there is no per-variant registration
/// and no listener bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A checkpoint commit was created with this message.
    Commit { message: String },
    /// The branch was pushed to the remote.
    Push { branch: String },
    /// A terminal error; emitted exactly once per failure.
    Error { message: String },
    OperationStart { name: String },
    OperationEnd { name: String },
}

/// Broadcast hub for [`SyncEvent`]s.
///
/// Slow subscribers lag and drop old events rather than applying
/// backpressure to the pipeline.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventHub {
    const CAPACITY: usize = 64;

    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        // Err means no subscribers; events are fire-and-forget.
        if self.tx.send(event.clone()).is_err() {
            debug!(?event, "event dropped, no subscribers");
        }
    }

    pub fn operation_start(&self, name: &str) {
        self.emit(SyncEvent::OperationStart {
            name: name.to_string(),
        });
    }

    pub fn operation_end(&self, name: &str) {
        self.emit(SyncEvent::OperationEnd {
            name: name.to_string(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(SyncEvent::Error {
            message: message.into(),
        });
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
