use std::sync::{Arc, RwLock};

/// Supplies the currently connected account address.
pub trait AccountProvider: Send + Sync {
    fn current_account(&self) -> Option<String>;
}

/// Settable account slot, the wallet side calls `connect`/`disconnect`.
#[derive(Debug, Clone, Default)]
pub struct ConnectedAccount {
    inner: Arc<RwLock<Option<String>>>,
}

impl ConnectedAccount {
    pub fn new(account: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(account)),
        }
    }

    pub fn connect(&self, account: impl Into<String>) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(account.into());
    }

    pub fn disconnect(&self) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

impl AccountProvider for ConnectedAccount {
    fn current_account(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
