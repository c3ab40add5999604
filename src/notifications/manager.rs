//! AsyncNotificationManager implementation

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::notifications::error::NotificationError;
use crate::notifications::event::{Event, EventFilter};
use crate::notifications::traits::SubscriberStatistics;

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: UnboundedSender<Event>,
    statistics: Arc<SubscriberStatistics>,
}

/// Fan-out hub for backup engine events
///
/// Result reporting is best-effort by contract: the engine logs publish
/// failures and keeps running. Subscribers whose receiver is gone are
/// dropped on the next publish that reaches them.
pub struct AsyncNotificationManager {
    subscribers: HashMap<String, SubscriberInfo>,
}

impl Default for AsyncNotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncNotificationManager {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        subscriber_id: String,
        filter: EventFilter,
        source: String,
    ) -> UnboundedReceiver<Event> {
        let (sender, receiver) = unbounded_channel();

        let subscriber_info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
            statistics: Arc::new(SubscriberStatistics::new()),
        };

        // Warn if overwriting existing subscriber
        if let Some(existing) = self.subscribers.insert(subscriber_id.clone(), subscriber_info) {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        }

        receiver
    }

    pub fn unsubscribe(&mut self, subscriber_id: &str) -> Result<(), NotificationError> {
        self.subscribers
            .remove(subscriber_id)
            .map(|_| ())
            .ok_or_else(|| NotificationError::SubscriberNotFound(subscriber_id.to_string()))
    }

    /// Deliver `event` to every subscriber whose filter accepts it.
    ///
    /// Subscribers with a closed receiver are removed; their ids are
    /// reported in the error so callers can log the drop.
    pub async fn publish(&mut self, event: Event) -> Result<(), NotificationError> {
        let mut failed_subscribers = Vec::new();

        for (id, info) in &self.subscribers {
            if !info.filter.accepts(&event) {
                continue;
            }
            match info.sender.send(event.clone()) {
                Ok(()) => info.statistics.record_event_sent(),
                Err(_) => {
                    info.statistics.record_error();
                    failed_subscribers.push(id.clone());
                }
            }
        }

        for id in &failed_subscribers {
            log::debug!("Dropping subscriber '{}' with closed receiver", id);
            self.subscribers.remove(id);
        }

        if failed_subscribers.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::PublishFailed {
                event_type: event.kind_label().to_string(),
                failed_subscribers,
            })
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    pub fn get_subscriber_statistics(
        &self,
        subscriber_id: &str,
    ) -> Option<Arc<SubscriberStatistics>> {
        self.subscribers
            .get(subscriber_id)
            .map(|info| Arc::clone(&info.statistics))
    }
}
