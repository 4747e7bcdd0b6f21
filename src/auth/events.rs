use tokio::sync::broadcast::{Receiver, Sender};
use tracing::debug;

use crate::auth::token::AccessToken;
use crate::auth::token_store::TokenStore;
use crate::utils::channel;

/// Refresh lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    RefreshPending { account: String },
    RefreshSucceeded { account: String, token: AccessToken },
    RefreshFailed { account: String, message: String },
}

/// Authentication state shared by one client: the token store and the event channel.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub tokens: TokenStore,
    events: Sender<AuthEvent>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        Self {
            tokens: TokenStore::new(),
            events: channel::run(),
        }
    }

    pub fn subscribe(&self) -> Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// No listeners is not an error.
    pub fn publish(&self, event: AuthEvent) {
        if let Err(err) = self.events.send(event) {
            debug!("auth event dropped, no listeners: {:?}", err.0);
        }
    }
}
