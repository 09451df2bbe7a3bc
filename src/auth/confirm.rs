use std::sync::Arc;

use crate::data::account::{Account, AccountStore};

use super::keys::{ActivationKeyStore, KeyError};
use super::{AdminContact, AuthConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Activated(Account),
    NotFound,
    Expired,
    AwaitingApproval(Vec<AdminContact>),
}

impl ConfirmationOutcome {
    /// The exact text shown to the user for each outcome.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Activated(_) => "Your account has been activated successfully",
            Self::NotFound => "This activation key no longer exists in the database",
            Self::Expired => "This activation key has expired",
            Self::AwaitingApproval(_) => "Your account is awaiting administrator approval",
        }
    }
}

/// Applies the key validity rules and the deployment's approval policy to a
/// submitted activation key.
pub struct ConfirmationWorkflow {
    keys: Arc<ActivationKeyStore>,
    accounts: Arc<dyn AccountStore>,
    config: AuthConfig,
}

impl ConfirmationWorkflow {
    pub fn new(
        keys: Arc<ActivationKeyStore>,
        accounts: Arc<dyn AccountStore>,
        config: AuthConfig,
    ) -> Self {
        Self {
            keys,
            accounts,
            config,
        }
    }

    /// Only the activation path touches stored state: the awaiting-approval
    /// branch reports without consuming the key, so the same link works again
    /// once an administrator has approved the account. A failed lookup or an
    /// expired key leaves everything exactly as it was.
    pub async fn confirm(&self, token: &str) -> anyhow::Result<ConfirmationOutcome> {
        let account = match self.keys.peek(token).await {
            Ok(account) => account,
            Err(KeyError::NotFound) => return Ok(ConfirmationOutcome::NotFound),
            Err(KeyError::Expired) => return Ok(ConfirmationOutcome::Expired),
            Err(KeyError::Store(err)) => return Err(err),
        };

        if !self.config.auto_approve_new_users && !account.active {
            tracing::debug!(
                "account ({}) holds a valid key but awaits administrator approval",
                account.username
            );
            return Ok(ConfirmationOutcome::AwaitingApproval(
                self.config.admins.clone(),
            ));
        }

        // activate before deleting the key; a failure in between can leave a
        // stale key for the next confirm, never an inactive account without one
        self.accounts.set_active(account.id, true).await?;

        match self.keys.consume(token).await {
            Ok(_) => {}
            // lost the race against a concurrent confirm of the same token
            Err(KeyError::NotFound) => return Ok(ConfirmationOutcome::NotFound),
            Err(KeyError::Expired) => return Ok(ConfirmationOutcome::Expired),
            Err(KeyError::Store(err)) => return Err(err),
        }

        tracing::debug!("account ({}) activated", account.username);

        Ok(ConfirmationOutcome::Activated(Account {
            active: true,
            ..account
        }))
    }
}
