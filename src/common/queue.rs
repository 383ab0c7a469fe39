//! Fan-out queue carrying service events to every listener.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Bounded broadcast queue, each subscriber sees every message sent after
/// it subscribed. A subscriber lagging more than `cap` messages skips the
/// oldest ones.
pub struct BroadcastQueue<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> BroadcastQueue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(cap);

        Arc::new(Self {
            sender,
        })
    }

    /// Publishes a message and returns how many subscribers will see it.
    /// Publishing with nobody listening is not an error, the message is dropped.
    pub fn publish(
        &self,
        msg: T,
    ) -> usize {
        self.sender.send(msg).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}
