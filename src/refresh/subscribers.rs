use std::collections::VecDeque;

use crate::auth::token::AccessToken;

/// Receives the refreshed token, or `None` when the refresh failed.
pub type Subscriber = Box<dyn FnOnce(Option<AccessToken>) + Send + 'static>;

/// Callbacks waiting on an in-flight refresh, notified in enqueue order.
#[derive(Default)]
pub struct SubscriberQueue {
    pending: VecDeque<Subscriber>,
}

impl SubscriberQueue {
    pub fn push(&mut self, subscriber: Subscriber) {
        self.pending.push_back(subscriber);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Leaves the queue empty.
    pub fn take(&mut self) -> SubscriberQueue {
        std::mem::take(self)
    }

    /// Invokes every callback once, front to back. Returns how many were notified.
    pub fn notify_all(self, outcome: Option<AccessToken>) -> usize {
        let count = self.pending.len();
        for subscriber in self.pending {
            subscriber(outcome.clone());
        }
        count
    }
}

impl std::fmt::Debug for SubscriberQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberQueue")
            .field("pending", &self.pending.len())
            .finish()
    }
}
