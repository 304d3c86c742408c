use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use worldmap_common::{BuildingId, PlayerId};
use worldmap_kernel::PlayerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topic {
    PlayerSelected,
    BuildingSelected,
    PanelSwitch,
    WorldStateChanged,
    PlayersUpdated,
    Chat,
    Forwarded,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::PlayerSelected,
        Topic::BuildingSelected,
        Topic::PanelSwitch,
        Topic::WorldStateChanged,
        Topic::PlayersUpdated,
        Topic::Chat,
        Topic::Forwarded,
    ];
}

/// Side panel a UI host should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    BuildingInfo(BuildingId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// `None` clears the current selection.
    PlayerSelected(Option<PlayerId>),
    BuildingSelected(BuildingId),
    PanelSwitch(Panel),
    /// Full roster after an occupancy transition.
    WorldStateChanged(Arc<[PlayerState]>),
    /// Player records of the last applied frame. A record that failed to
    /// decode appears with its last known state.
    PlayersUpdated(Arc<[PlayerState]>),
    Chat(Value),
    /// Any inbound message type the scene does not interpret.
    Forwarded { kind: String, data: Value },
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::PlayerSelected(_) => Topic::PlayerSelected,
            Self::BuildingSelected(_) => Topic::BuildingSelected,
            Self::PanelSwitch(_) => Topic::PanelSwitch,
            Self::WorldStateChanged(_) => Topic::WorldStateChanged,
            Self::PlayersUpdated(_) => Topic::PlayersUpdated,
            Self::Chat(_) => Topic::Chat,
            Self::Forwarded { .. } => Topic::Forwarded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    topics: BTreeSet<Topic>,
    mailbox: mpsc::UnboundedSender<BusEvent>,
}

#[derive(Default)]
struct BusInner {
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_id: u64,
    published: u64,
}

/// Publish/subscribe between the scene and UI panels.
///
/// A cloneable handle; every clone talks to the same subscriber set.
/// Delivery goes into per-subscriber mailboxes, so publishing never runs
/// subscriber code.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a mailbox for `topics`. Pair with [`EventBus::unsubscribe`] on unmount.
    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscribers.insert(
            id,
            Subscriber {
                topics: topics.iter().copied().collect(),
                mailbox: tx,
            },
        );
        tracing::debug!(%id, ?topics, "bus subscribe");
        Subscription { id, mailbox: rx }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(%id, "bus unsubscribe");
        }
        removed
    }

    /// Deliver `event` to every subscriber of its topic. Subscribers whose
    /// mailbox was dropped are pruned. Returns the number of deliveries.
    pub fn publish(&self, event: BusEvent) -> usize {
        let topic = event.topic();
        let mut inner = self.lock();
        inner.published += 1;
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sub) in &inner.subscribers {
            if !sub.topics.contains(&topic) {
                continue;
            }
            if sub.mailbox.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            tracing::debug!(%id, "pruning dropped bus subscriber");
            inner.subscribers.remove(&id);
        }
        tracing::trace!(?topic, delivered, "bus publish");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Events published since the bus was created.
    pub fn published(&self) -> u64 {
        self.lock().published
    }
}

/// Receiving end of a bus subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    mailbox: mpsc::UnboundedReceiver<BusEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, waiting if the mailbox is empty. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.mailbox.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.mailbox.try_recv().ok()
    }

    /// Everything currently waiting in the mailbox.
    pub fn drain(&mut self) -> Vec<BusEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_only_subscribed_topics() {
        let bus = EventBus::new();
        let mut selections = bus.subscribe(&[Topic::PlayerSelected]);
        let mut chat = bus.subscribe(&[Topic::Chat]);

        let n = bus.publish(BusEvent::PlayerSelected(Some(PlayerId::from(42u64))));
        assert_eq!(n, 1);
        assert_eq!(
            selections.drain(),
            vec![BusEvent::PlayerSelected(Some(PlayerId::from(42u64)))]
        );
        assert!(chat.drain().is_empty());
    }

    #[test]
    fn unsubscribe_closes_the_mailbox() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&Topic::ALL);
        assert!(bus.unsubscribe(sub.id()));
        assert!(!bus.unsubscribe(sub.id()));
        assert_eq!(bus.publish(BusEvent::Chat(Value::Null)), 0);
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn dropped_subscriptions_are_pruned_on_publish() {
        let bus = EventBus::new();
        let sub = bus.subscribe(&[Topic::Chat]);
        let _keep = bus.subscribe(&[Topic::Chat]);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(bus.publish(BusEvent::Chat(Value::Null)), 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn clones_share_subscribers() {
        let bus = EventBus::new();
        let other = bus.clone();
        let mut sub = other.subscribe(&[Topic::BuildingSelected]);
        bus.publish(BusEvent::BuildingSelected(BuildingId::from(17u64)));
        assert_eq!(
            sub.try_recv(),
            Some(BusEvent::BuildingSelected(BuildingId::from(17u64)))
        );
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn recv_waits_for_the_next_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&[Topic::Forwarded]);
        let publisher = bus.clone();
        tokio::spawn(async move {
            publisher.publish(BusEvent::Forwarded {
                kind: "leaderboard".into(),
                data: Value::Null,
            });
        });
        let event = sub.recv().await;
        assert!(matches!(event, Some(BusEvent::Forwarded { kind, .. }) if kind == "leaderboard"));
    }
}
