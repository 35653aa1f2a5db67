//! Notification publishing.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::OrderPlacedEvent;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Nobody is listening on the topic.
    #[error("No subscribers on topic '{0}'")]
    NoSubscribers(String),

    /// The bus refused the message.
    #[error("Notification bus unavailable: {0}")]
    Unavailable(String),

    /// The publish did not finish in time.
    #[error("Publishing timed out")]
    Timeout,
}

/// A notification as it travels on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub topic: String,
    pub event: OrderPlacedEvent,
}

/// Sends order notifications to downstream consumers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, event: OrderPlacedEvent) -> Result<(), PublishError>;
}

/// In-process bus backed by a tokio broadcast channel.
///
/// Every subscriber sees every event published after it subscribed. A slow
/// subscriber that falls more than `capacity` events behind loses the oldest.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, topic: &str, event: OrderPlacedEvent) -> Result<(), PublishError> {
        self.sender
            .send(PublishedEvent {
                topic: topic.to_string(),
                event,
            })
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers(topic.to_string()))
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<PublishedEvent>,
    fail_on_publish: bool,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail every publish.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_publish = fail;
    }

    /// Returns every successfully published event, oldest first.
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .clone()
    }

    pub fn published_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .len()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, topic: &str, event: OrderPlacedEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_publish {
            return Err(PublishError::Unavailable("configured to fail".to_string()));
        }

        state.published.push(PublishedEvent {
            topic: topic.to_string(),
            event,
        });
        Ok(())
    }
}
