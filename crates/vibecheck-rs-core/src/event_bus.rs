//! Broadcast event bus for observing store changes.

use log::debug;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use vibecheck_rs_protocol::{EventSink, FeedEvent};

/// Broadcast-backed [`EventSink`]. Events emitted with no subscribers are dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel buffer size.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        debug!("event bus initialized (buffer={})", buffer);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a `Stream`; lagged receivers yield an error item and continue.
    pub fn stream(&self) -> BroadcastStream<FeedEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: FeedEvent) {
        let _ = self.sender.send(event);
    }
}
