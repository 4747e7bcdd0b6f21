//! Single-flight token refresh.
//!
//! The first caller to observe an expired token becomes the leader and performs the
//! refresh; every caller arriving while it is in flight is queued as a subscriber and
//! learns the outcome when the leader settles. Electing the leader and enqueueing a
//! subscriber happen under the same lock, so two refreshes can never overlap.
//!
//! Each caller also gets a [`ReplayTurn`] chained to the caller that joined before it,
//! so replays reach the server leader first, then in queue order.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::auth::token::AccessToken;
use crate::observability::metrics::try_metrics;
use crate::refresh::subscribers::SubscriberQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing,
}

#[derive(Debug)]
struct RefreshState {
    phase: Phase,
    /// only non-empty while `Refreshing`
    subscribers: SubscriberQueue,
    /// released by the most recent caller to join
    last_turn: Option<oneshot::Receiver<()>>,
}

#[derive(Debug)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of joining a refresh.
pub enum RefreshTicket<'a> {
    /// Caller must perform the refresh and settle the lease.
    Leader {
        lease: RefreshLease<'a>,
        turn: ReplayTurn,
    },
    /// A refresh is already in flight; wait for it.
    Follower {
        pending: PendingOutcome,
        turn: ReplayTurn,
    },
}

/// Follower side of a refresh.
#[derive(Debug)]
pub struct PendingOutcome(oneshot::Receiver<Option<AccessToken>>);

impl PendingOutcome {
    /// `None` when the refresh failed or its leader went away.
    pub async fn outcome(self) -> Option<AccessToken> {
        self.0.await.ok().flatten()
    }
}

/// A caller's place in the replay order.
///
/// Dropping a turn without releasing it lets the next caller go as well.
#[derive(Debug)]
pub struct ReplayTurn {
    after: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

impl ReplayTurn {
    /// Resolves once the caller ahead has been answered or gave up.
    pub async fn wait(&mut self) {
        if let Some(ahead) = self.after.take() {
            let _ = ahead.await;
        }
    }

    /// Lets the next caller in line replay.
    pub fn release(self) {
        let _ = self.done.send(());
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState {
                phase: Phase::Idle,
                subscribers: SubscriberQueue::default(),
                last_turn: None,
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_refreshing(&self) -> bool {
        self.phase() == Phase::Refreshing
    }

    /// Subscribers currently queued.
    pub fn waiting(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Leads a new refresh, or follows the one in flight.
    pub fn join(&self) -> RefreshTicket<'_> {
        let mut state = self.lock();
        let (done, next) = oneshot::channel();
        let phase = state.phase;
        match phase {
            Phase::Refreshing => {
                let turn = ReplayTurn {
                    after: state.last_turn.replace(next),
                    done,
                };
                let (tx, rx) = oneshot::channel();
                state.subscribers.push(Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                }));
                let position = state.subscribers.len();
                drop(state);
                if let Some(metrics) = try_metrics() {
                    metrics.refresh_waiters.inc();
                }
                debug!("refresh in flight, queued as subscriber #{}", position);
                RefreshTicket::Follower {
                    pending: PendingOutcome(rx),
                    turn,
                }
            }
            Phase::Idle => {
                state.phase = Phase::Refreshing;
                state.last_turn = Some(next);
                drop(state);
                set_in_flight(1);
                debug!("token refresh started");
                RefreshTicket::Leader {
                    lease: RefreshLease {
                        coordinator: self,
                        settled: false,
                    },
                    turn: ReplayTurn { after: None, done },
                }
            }
        }
    }

    fn settle(&self, outcome: Option<AccessToken>) -> usize {
        let subscribers = {
            let mut state = self.lock();
            state.phase = Phase::Idle;
            state.last_turn = None;
            state.subscribers.take()
        };
        set_in_flight(0);
        if subscribers.is_empty() {
            debug!("token refresh settled, nobody queued");
            return 0;
        }
        // callbacks run outside the lock
        let notified = subscribers.notify_all(outcome);
        debug!("token refresh settled, {} subscribers notified", notified);
        notified
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held by the refresh leader. Dropping it unsettled fails the refresh for every subscriber.
#[must_use = "a lease must be settled, dropping it fails the refresh"]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Returns to `Idle` and notifies every subscriber in order.
    pub fn settle(mut self, outcome: Option<AccessToken>) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("token refresh abandoned before settling, failing queued requests");
            self.coordinator.settle(None);
        }
    }
}

fn set_in_flight(value: i64) {
    if let Some(metrics) = try_metrics() {
        metrics.refresh_in_flight.set(value);
    }
}
