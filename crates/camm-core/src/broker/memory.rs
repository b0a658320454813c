//! An in-process broker.
//!
//! Connections share one routing table. A message sent to a queue goes to the
//! queue's first subscriber, or waits until somebody subscribes; a message sent
//! to a topic goes to every current subscriber and is otherwise lost.

use super::connection::{Connection, Message};
use super::error::BrokerError;
use super::message::Destination;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

type ClientId = u64;

#[derive(Default)]
struct State {
    next_client: ClientId,
    clients: HashMap<ClientId, mpsc::UnboundedSender<Message>>,
    subscribers: HashMap<Destination, Vec<ClientId>>,
    pending: HashMap<Destination, VecDeque<String>>,
}

impl State {
    fn deliver(&mut self, destination: &Destination, body: &str) {
        let subscribers = self.subscribers.get(destination).map(Vec::as_slice).unwrap_or_default();
        let message = Message {
            destination: destination.clone(),
            body: body.to_string(),
        };

        if destination.is_topic() {
            for id in subscribers {
                if let Some(client) = self.clients.get(id) {
                    let _ = client.send(message.clone());
                }
            }
            return;
        }

        let delivered = subscribers
            .iter()
            .filter_map(|id| self.clients.get(id))
            .any(|client| client.send(message.clone()).is_ok());
        if !delivered {
            trace!("No consumer on {}, keeping the message", destination);
            self.pending
                .entry(destination.clone())
                .or_default()
                .push_back(message.body);
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self) -> MemoryConnection {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        state.next_client += 1;
        let id = state.next_client;
        state.clients.insert(id, sender);
        debug!("In-memory client {} connected", id);
        MemoryConnection {
            id,
            broker: self.clone(),
            inbox: receiver,
        }
    }

    /// Ends every session; pending `recv` calls resolve to `None`.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.clients.clear();
        state.subscribers.clear();
    }

    /// Number of undelivered messages held for a queue.
    pub async fn pending(&self, destination: &Destination) -> usize {
        let state = self.state.lock().await;
        state.pending.get(destination).map_or(0, VecDeque::len)
    }
}

pub struct MemoryConnection {
    id: ClientId,
    broker: MemoryBroker,
    inbox: mpsc::UnboundedReceiver<Message>,
}

impl Connection for MemoryConnection {
    async fn send(&mut self, destination: &Destination, body: &str) -> Result<(), BrokerError> {
        let mut state = self.broker.state.lock().await;
        if !state.clients.contains_key(&self.id) {
            return Err(BrokerError::ConnectionClosed);
        }
        state.deliver(destination, body);
        Ok(())
    }

    async fn subscribe(&mut self, destination: &Destination) -> Result<(), BrokerError> {
        let mut state = self.broker.state.lock().await;
        let Some(client) = state.clients.get(&self.id).cloned() else {
            return Err(BrokerError::ConnectionClosed);
        };
        let subscribers = state.subscribers.entry(destination.clone()).or_default();
        if !subscribers.contains(&self.id) {
            subscribers.push(self.id);
        }
        if let Some(pending) = state.pending.remove(destination) {
            for body in pending {
                let _ = client.send(Message {
                    destination: destination.clone(),
                    body,
                });
            }
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, destination: &Destination) -> Result<(), BrokerError> {
        let mut state = self.broker.state.lock().await;
        let subscribers = state
            .subscribers
            .get_mut(destination)
            .filter(|ids| ids.contains(&self.id))
            .ok_or_else(|| BrokerError::NotSubscribed(destination.to_string()))?;
        subscribers.retain(|id| *id != self.id);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Message>, BrokerError> {
        Ok(self.inbox.recv().await)
    }

    async fn disconnect(self) -> Result<(), BrokerError> {
        let mut state = self.broker.state.lock().await;
        state.clients.remove(&self.id);
        for subscribers in state.subscribers.values_mut() {
            subscribers.retain(|id| *id != self.id);
        }
        debug!("In-memory client {} disconnected", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_messages_wait_for_a_subscriber() {
        let broker = MemoryBroker::new();
        let queue = Destination::new("PARAMS.READY");
        let mut producer = broker.connect().await;
        producer.send(&queue, "first").await.unwrap();
        assert_eq!(broker.pending(&queue).await, 1);

        let mut consumer = broker.connect().await;
        consumer.subscribe(&queue).await.unwrap();
        assert_eq!(broker.pending(&queue).await, 0);
        assert_eq!(consumer.recv().await.unwrap().unwrap().body, "first");
    }

    #[tokio::test]
    async fn queue_messages_reach_a_single_consumer() {
        let broker = MemoryBroker::new();
        let queue = Destination::new("Q1");
        let mut a = broker.connect().await;
        let mut b = broker.connect().await;
        a.subscribe(&queue).await.unwrap();
        b.subscribe(&queue).await.unwrap();

        let mut producer = broker.connect().await;
        producer.send(&queue, "job").await.unwrap();
        assert_eq!(a.recv().await.unwrap().unwrap().body, "job");
        assert!(b.inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn topic_messages_reach_every_subscriber() {
        let broker = MemoryBroker::new();
        let topic = Destination::new("/topic/STATUS");
        let mut a = broker.connect().await;
        let mut b = broker.connect().await;
        a.subscribe(&topic).await.unwrap();
        b.subscribe(&topic).await.unwrap();

        let mut producer = broker.connect().await;
        producer.send(&topic, "tick").await.unwrap();
        assert_eq!(a.recv().await.unwrap().unwrap().body, "tick");
        assert_eq!(b.recv().await.unwrap().unwrap().body, "tick");
        assert_eq!(broker.pending(&topic).await, 0);
    }

    #[tokio::test]
    async fn unsubscribed_queue_keeps_later_messages() {
        let broker = MemoryBroker::new();
        let queue = Destination::new("Q2");
        let mut consumer = broker.connect().await;
        consumer.subscribe(&queue).await.unwrap();
        consumer.unsubscribe(&queue).await.unwrap();
        assert!(matches!(
            consumer.unsubscribe(&queue).await,
            Err(BrokerError::NotSubscribed(_))
        ));

        consumer.send(&queue, "late").await.unwrap();
        assert_eq!(broker.pending(&queue).await, 1);
    }

    #[tokio::test]
    async fn closing_the_broker_ends_sessions() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.connect().await;
        broker.close().await;
        assert!(consumer.recv().await.unwrap().is_none());
        assert!(matches!(
            consumer.send(&Destination::new("Q"), "x").await,
            Err(BrokerError::ConnectionClosed)
        ));
    }
}
