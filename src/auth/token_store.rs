use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::token::AccessToken;

/// Access tokens keyed by account address. Addresses compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<HashMap<String, AccessToken>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, account: &str, token: AccessToken) {
        let mut map = self.inner.write().await;
        map.insert(key(account), token);
    }

    pub async fn get(&self, account: &str) -> Option<AccessToken> {
        self.inner.read().await.get(&key(account)).cloned()
    }
}

fn key(account: &str) -> String {
    account.to_ascii_lowercase()
}
