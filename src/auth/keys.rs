use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::account::{Account, AccountStore};

use super::{Clock, TokenGenerator};

/// How long a freshly issued key stays valid.
pub const KEY_LIFETIME_DAYS: i64 = 7;

/// Length of the hex token, 32 random bytes worth.
pub const TOKEN_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ActivationKey {
    pub account_id: i32,
    pub token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("This activation key no longer exists in the database")]
    NotFound,
    #[error("This activation key has expired")]
    Expired,
    #[error(transparent)]
    Store(anyhow::Error),
}

/// Result of trying to insert a key for an account.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The key was written (fresh row, or overwrote the old one on force).
    Stored(ActivationKey),
    /// The account already had a key and force was off; here it is, unchanged.
    Existing(ActivationKey),
    /// Another outstanding key already uses this token value.
    TokenTaken,
}

/// Storage for activation keys. One row per account, token unique across all
/// rows; both must hold under concurrent writers.
#[async_trait]
pub trait ActivationKeyRepo: Send + Sync {
    async fn get_for_account(&self, account_id: i32) -> anyhow::Result<Option<ActivationKey>>;

    async fn get_by_token(&self, token: &str) -> anyhow::Result<Option<ActivationKey>>;

    async fn insert(&self, key: &ActivationKey, force: bool) -> anyhow::Result<InsertOutcome>;

    /// Returns whether a row was actually removed. Two callers racing on the
    /// same token see exactly one `true`.
    async fn delete_by_token(&self, token: &str) -> anyhow::Result<bool>;
}

/// Lifecycle rules for activation keys: issue, look up, consume. The clock
/// and the token source are injected so expiry and token values are exact in
/// tests.
pub struct ActivationKeyStore {
    repo: Arc<dyn ActivationKeyRepo>,
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
}

impl ActivationKeyStore {
    pub fn new(
        repo: Arc<dyn ActivationKeyRepo>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        Self {
            repo,
            accounts,
            clock,
            tokens,
        }
    }

    /// Issue a key for the account. Without `force` a second issue is a no-op
    /// returning the existing key; with `force` the row keeps its identity but
    /// gets a new token and expiry. Token collisions regenerate silently.
    pub async fn issue(&self, account: &Account, force: bool) -> anyhow::Result<ActivationKey> {
        loop {
            let key = ActivationKey {
                account_id: account.id,
                token: self.tokens.random_hex(TOKEN_HEX_LEN),
                expires: self.clock.now() + chrono::Duration::days(KEY_LIFETIME_DAYS),
            };

            match self.repo.insert(&key, force).await? {
                InsertOutcome::Stored(key) => {
                    tracing::debug!("issued activation key for account ({})", account.id);
                    return Ok(key);
                }
                InsertOutcome::Existing(key) => return Ok(key),
                InsertOutcome::TokenTaken => continue,
            }
        }
    }

    pub async fn get(&self, account: &Account) -> anyhow::Result<Option<ActivationKey>> {
        self.repo.get_for_account(account.id).await
    }

    /// Validity check without consuming: applies the same lookup and expiry
    /// rules as `consume` but leaves the row untouched.
    pub async fn peek(&self, token: &str) -> Result<Account, KeyError> {
        let key = self
            .repo
            .get_by_token(token)
            .await
            .map_err(KeyError::Store)?
            .ok_or(KeyError::NotFound)?;

        if self.clock.now() > key.expires {
            return Err(KeyError::Expired);
        }

        let account = self
            .accounts
            .get_by_id(key.account_id)
            .await
            .map_err(KeyError::Store)?
            .ok_or(KeyError::NotFound)?;

        Ok(account)
    }

    /// Consume the key and hand back the owning account. Expired keys are
    /// reported but left in place; only a successful consume deletes the row,
    /// and the delete is the serialization point between racing confirms.
    pub async fn consume(&self, token: &str) -> Result<Account, KeyError> {
        let account = self.peek(token).await?;

        if !self
            .repo
            .delete_by_token(token)
            .await
            .map_err(KeyError::Store)?
        {
            // somebody else consumed it between our lookup and delete
            return Err(KeyError::NotFound);
        }

        tracing::debug!("activation key consumed for account ({})", account.id);
        Ok(account)
    }
}
