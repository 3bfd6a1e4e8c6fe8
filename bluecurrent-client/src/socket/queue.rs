//! Fan-out queue
//!
//! Every published message is delivered to each subscription open at publish
//! time. Subscriptions see messages in publish order and never see anything
//! published before they were opened. Dropping a [`Subscription`] unregisters
//! it, so detached subscribers do not accumulate.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::messages::InboundMessage;
use crate::error::{ClientError, Result};

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<InboundMessage>>,
    /// Set once the producer is gone; new subscriptions start closed
    closed: Option<String>,
}

/// Broadcast of inbound messages to all open subscriptions
#[derive(Debug, Clone, Default)]
pub struct FanoutQueue {
    registry: Arc<Mutex<Registry>>,
}

impl FanoutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver to every open subscription, returns how many received it
    pub fn publish(&self, message: InboundMessage) -> usize {
        let registry = self.registry.lock();
        let mut delivered = 0;
        for tx in registry.subscribers.values() {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(kind = ?message.kind(), delivered, "Published message");
        delivered
    }

    /// Open a subscription receiving everything published from now on
    pub fn subscribe(&self) -> Subscription {
        let mut registry = self.registry.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.next_id;
        registry.next_id += 1;

        // Leaving the sender out closes the channel right away
        if registry.closed.is_none() {
            registry.subscribers.insert(id, tx);
        }

        Subscription {
            id,
            rx,
            registry: self.registry.clone(),
        }
    }

    /// Stop the queue: open subscriptions drain what they have, then fail with `reason`
    pub fn close(&self, reason: impl Into<String>) {
        let mut registry = self.registry.lock();
        if registry.closed.is_none() {
            let reason = reason.into();
            debug!(subscribers = registry.subscribers.len(), %reason, "Closing fan-out queue");
            registry.closed = Some(reason);
        }
        registry.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.registry.lock().closed.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}

/// Scoped view over a [`FanoutQueue`], unregistered on drop
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<InboundMessage>,
    registry: Arc<Mutex<Registry>>,
}

impl Subscription {
    /// Next message, or `Disconnected` once the queue is closed and drained
    pub async fn recv(&mut self) -> Result<InboundMessage> {
        match self.rx.recv().await {
            Some(message) => Ok(message),
            None => Err(self.closed_error()),
        }
    }

    /// Next already-delivered message without waiting
    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }

    fn closed_error(&self) -> ClientError {
        let reason = self
            .registry
            .lock()
            .closed
            .clone()
            .unwrap_or_else(|| "message queue closed".to_string());
        ClientError::Disconnected(reason)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.lock().subscribers.remove(&self.id);
    }
}
