//! Topic-based event bus implementation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use super::types::{AbilityEvent, CombatEvent, EntityEvent, TransactionEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Spawns and per-entity change bitmasks
    Entity,
    /// Attack reports, damage and subsystem escalation
    Combat,
    /// Ability executions and limit resets
    Ability,
    /// Settled and rolled back transactions
    Transaction,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Entity, Topic::Combat, Topic::Ability, Topic::Transaction];
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Entity(EntityEvent),
    Combat(CombatEvent),
    Ability(AbilityEvent),
    Transaction(TransactionEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Entity(_) => Topic::Entity,
            Event::Combat(_) => Topic::Combat,
            Event::Ability(_) => Topic::Ability,
            Event::Transaction(_) => Topic::Transaction,
        }
    }
}

/// One broadcast channel per topic, fixed at construction.
#[derive(Debug)]
struct TopicChannels {
    entity: broadcast::Sender<Event>,
    combat: broadcast::Sender<Event>,
    ability: broadcast::Sender<Event>,
    transaction: broadcast::Sender<Event>,
}

impl TopicChannels {
    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Entity => &self.entity,
            Topic::Combat => &self.combat,
            Topic::Ability => &self.ability,
            Topic::Transaction => &self.transaction,
        }
    }
}

/// Topic-based event bus
///
/// Consumers subscribe to the topics they care about. Publishing is
/// best-effort: events sent while a topic has no subscribers are dropped,
/// and slow subscribers observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus {
    channels: Arc<TopicChannels>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: Arc::new(TopicChannels {
                entity: broadcast::channel(capacity).0,
                combat: broadcast::channel(capacity).0,
                ability: broadcast::channel(capacity).0,
                transaction: broadcast::channel(capacity).0,
            }),
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.channels.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            trace!(target: "runtime::events", ?topic, "no subscribers for topic");
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.channels.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }

    /// Current number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.channels.sender(topic).receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::EntityId;

    #[tokio::test]
    async fn events_only_reach_their_topic() {
        let bus = EventBus::with_capacity(8);
        let mut entity_rx = bus.subscribe(Topic::Entity);
        let mut combat_rx = bus.subscribe(Topic::Combat);

        bus.publish(Event::Entity(EntityEvent::Spawned {
            entity: EntityId(3),
        }));

        let event = entity_rx.recv().await.unwrap();
        assert_eq!(event.topic(), Topic::Entity);
        assert!(combat_rx.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(Event::Ability(AbilityEvent::LimitsReset {
            scope: crate::workers::ResetScope::Round,
        }));
        assert_eq!(bus.subscriber_count(Topic::Ability), 0);
    }

    #[test]
    fn subscribe_multiple_covers_each_topic() {
        let bus = EventBus::default();
        let receivers = bus.subscribe_multiple(&Topic::ALL);
        assert_eq!(receivers.len(), 4);
        for topic in Topic::ALL {
            assert_eq!(bus.subscriber_count(topic), 1);
        }
    }
}
