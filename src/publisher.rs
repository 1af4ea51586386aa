use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, warn};

use crate::events::Event;

pub type SubscriberId = u64;

/// Fans serialized events out to every connected client without blocking.
/// A client whose queue is full or closed is dropped on the spot.
#[derive(Default)]
pub struct EventPublisher {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<String>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sender: mpsc::Sender<String>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .insert(id, sender);
        id
    }

    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .remove(&id)
            .is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .len()
    }

    /// Serializes once and enqueues to every subscriber. Returns how many
    /// subscribers were dropped.
    pub fn publish(&self, event: &Event) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                error!(kind = event.kind(), %err, "failed to encode event");
                return 0;
            }
        };
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        let before = subscribers.len();
        subscribers.retain(|id, tx| match tx.try_send(payload.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = id, kind = event.kind(), "outbound queue full, dropping client");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        before - subscribers.len()
    }

    pub fn publish_all<'a>(&self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.publish(event);
        }
    }
}
