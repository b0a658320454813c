use super::error::BrokerError;
use tokio::sync::oneshot;

/// Creates a single-use notification pair.
///
/// The waiting side suspends until the notifier fires once. Dropping the
/// notifier without firing wakes the waiter with [`BrokerError::ConnectionClosed`].
pub fn rendezvous<T>() -> (Notifier<T>, Rendezvous<T>) {
    let (sender, receiver) = oneshot::channel();
    (Notifier { sender }, Rendezvous { receiver })
}

#[derive(Debug)]
pub struct Notifier<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Notifier<T> {
    /// Hands the value over. Returns it back if the waiter is gone.
    pub fn notify(self, value: T) -> Result<(), T> {
        self.sender.send(value)
    }
}

#[derive(Debug)]
pub struct Rendezvous<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Rendezvous<T> {
    pub async fn wait(self) -> Result<T, BrokerError> {
        self.receiver.await.map_err(|_| BrokerError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waiter_receives_the_notified_value() {
        let (notifier, rendezvous) = rendezvous();
        tokio::spawn(async move {
            let _ = notifier.notify(42);
        });
        assert_eq!(rendezvous.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dropped_notifier_releases_the_waiter() {
        let (notifier, rendezvous) = rendezvous::<u32>();
        drop(notifier);
        assert!(matches!(rendezvous.wait().await, Err(BrokerError::ConnectionClosed)));
    }

    #[test]
    fn notify_without_waiter_returns_the_value() {
        let (notifier, rendezvous) = rendezvous();
        drop(rendezvous);
        assert_eq!(notifier.notify("done"), Err("done"));
    }
}
