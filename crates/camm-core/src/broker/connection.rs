use super::error::BrokerError;
use super::message::Destination;
use serde::Serialize;
use std::future::Future;

/// A message delivered on one of the connection's subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub destination: Destination,
    pub body: String,
}

/// A session with a message broker.
///
/// Messages sent to a queue reach one subscriber; messages sent to a topic
/// reach every subscriber. Delivery order and deduplication are left to the
/// broker.
pub trait Connection: Send {
    fn send(
        &mut self,
        destination: &Destination,
        body: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    fn subscribe(&mut self, destination: &Destination) -> impl Future<Output = Result<(), BrokerError>> + Send;

    fn unsubscribe(&mut self, destination: &Destination)
    -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Waits for the next message on any subscription. Resolves to `None` once
    /// the broker has closed the session.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Message>, BrokerError>> + Send;

    fn disconnect(self) -> impl Future<Output = Result<(), BrokerError>> + Send
    where
        Self: Sized;
}

/// Serializes `value` as JSON and sends it.
pub async fn send_json<C, T>(connection: &mut C, destination: &Destination, value: &T) -> Result<(), BrokerError>
where
    C: Connection,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_string(value)?;
    connection.send(destination, &body).await
}
