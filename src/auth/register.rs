use std::sync::Arc;

use crate::data::account::{Account, AccountError, AccountStore};

use super::events::{EventBus, RegistrationCompleted};
use super::keys::ActivationKeyStore;

/// Turns a submitted registration into an inactive account with exactly one
/// outstanding activation key, then tells anyone listening.
pub struct RegistrationWorkflow {
    accounts: Arc<dyn AccountStore>,
    keys: Arc<ActivationKeyStore>,
    bus: Arc<EventBus>,
}

impl RegistrationWorkflow {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        keys: Arc<ActivationKeyStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            accounts,
            keys,
            bus,
        }
    }

    /// Validation failures from the account store come back unchanged; no key
    /// is issued and no event fires unless the account was actually created.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AccountError> {
        let account = self.accounts.create(username, email, password, false).await?;

        self.keys.issue(&account, false).await?;

        self.bus
            .publish(RegistrationCompleted {
                account: account.clone(),
            })
            .await;

        Ok(account)
    }
}
