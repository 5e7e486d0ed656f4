use parking_lot::Mutex;
use vibecheck_rs_protocol::{EventSink, FeedEvent, FeedEventPayload};

/// Event sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FeedEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<FeedEvent> {
        self.events.lock().clone()
    }

    pub fn payloads(&self) -> Vec<FeedEventPayload> {
        self.events
            .lock()
            .iter()
            .map(|event| event.payload.clone())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: FeedEvent) {
        self.events.lock().push(event);
    }
}
