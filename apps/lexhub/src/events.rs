//! # Event Bus
//!
//! Broadcast fan-out of [`HubEvent`]s to in-process subscribers.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and a slow subscriber loses the oldest events (it sees a lag
//! notice instead).

use lexhub_core::{EventSink, HubEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Fire-and-forget broadcast sink.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HubEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: HubEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("event dropped, no subscribers");
        }
    }
}

/// Log every event at debug level until the bus closes.
///
/// Must be called from within a tokio runtime.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::debug!(
                        event = event.name(),
                        entity = event.entity(),
                        timestamp = event.timestamp(),
                        "data event"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
