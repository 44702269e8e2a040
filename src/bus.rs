//! In-process fan-out of committed alert mutations.
//!
//! The lifecycle manager publishes an [`AlertEvent`] after every successful write and
//! every connected socket session holds a [`Subscription`]. Delivery is best effort:
//! nothing is persisted, a session that is not connected never sees the event, and a
//! session that falls more than the channel capacity behind skips ahead and must
//! resynchronize with a fresh list.
//!
//! One broadcast channel means one total order, so every subscriber observes events for
//! the same alert in publish order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Alert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Created(Alert),
    Updated(Alert),
    Deleted { id: Uuid },
}

impl AlertEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AlertEvent::Created(_) => EventKind::Created,
            AlertEvent::Updated(_) => EventKind::Updated,
            AlertEvent::Deleted { .. } => EventKind::Deleted,
        }
    }

    pub fn alert_id(&self) -> Uuid {
        match self {
            AlertEvent::Created(alert) | AlertEvent::Updated(alert) => alert.id,
            AlertEvent::Deleted { id } => *id,
        }
    }
}

/// Cheap to clone; clones share the same channel.
#[derive(Clone)]
pub struct FanOutBus {
    tx: broadcast::Sender<AlertEvent>,
    next_subscriber: Arc<AtomicU64>,
}

impl FanOutBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_subscriber: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Never blocks and never fails; with no subscribers the event is dropped.
    pub fn publish(&self, event: AlertEvent) {
        let kind = event.kind();
        let alert_id = event.alert_id();
        match self.tx.send(event) {
            Ok(subscribers) => debug!(?kind, %alert_id, subscribers, "Published alert event"),
            Err(_) => debug!(?kind, %alert_id, "No subscribers for alert event"),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        debug!(subscriber = id, "Subscribed to alert events");
        Subscription {
            id,
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Idempotent; also fine after the subscriber's connection is gone.
    pub fn unsubscribe(&self, subscription: &mut Subscription) {
        subscription.close();
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct Subscription {
    id: u64,
    rx: Option<broadcast::Receiver<AlertEvent>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// Next event in publish order, or `None` once unsubscribed or the bus is gone.
    pub async fn recv(&mut self) -> Option<AlertEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(
                        subscriber = self.id,
                        missed, "Subscriber fell behind, skipped alert events"
                    );
                }
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Next event that has already been published, without waiting.
    pub fn try_recv(&mut self) -> Option<AlertEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(
                        subscriber = self.id,
                        missed, "Subscriber fell behind, skipped alert events"
                    );
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.rx.take().is_some() {
            debug!(subscriber = self.id, "Unsubscribed from alert events");
        }
    }
}
