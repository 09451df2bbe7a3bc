use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::data::account::Account;

/// Fired once an account and its activation key have been durably created.
#[derive(Debug, Clone)]
pub struct RegistrationCompleted {
    pub account: Account,
}

#[async_trait]
pub trait RegistrationListener: Send + Sync {
    async fn on_registration_completed(&self, event: &RegistrationCompleted);
}

/// Explicit subscriber list owned by the composition root. Listeners are
/// opt-in; registration works fine with none attached.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Arc<dyn RegistrationListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn RegistrationListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    pub fn unsubscribe(&self, listener: &Arc<dyn RegistrationListener>) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub async fn publish(&self, event: RegistrationCompleted) {
        let listeners = self.listeners.lock().unwrap().clone();
        tracing::debug!(
            "registration completed for ({}), notifying {} listener(s)",
            event.account.username,
            listeners.len()
        );
        for listener in listeners {
            listener.on_registration_completed(&event).await;
        }
    }
}
