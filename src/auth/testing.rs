//! In-memory stand-ins for every collaborator, so the workflows run
//! deterministically without Postgres, SMTP, wall clocks or real randomness.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use email_address::EmailAddress;

use crate::data::account::{Account, AccountError, AccountStore};

use super::confirm::ConfirmationWorkflow;
use super::events::EventBus;
use super::keys::{ActivationKey, ActivationKeyRepo, ActivationKeyStore, InsertOutcome};
use super::mail::MailSender;
use super::register::RegistrationWorkflow;
use super::{AuthConfig, Clock, StaticSiteConfig, TokenGenerator};

pub struct MemoryAccountStore {
    rows: Mutex<Vec<Account>>,
    next_id: AtomicI32,
    set_active_fails: AtomicBool,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1),
            set_active_fails: AtomicBool::new(false),
        }
    }

    /// The next `set_active` call errors, as a dropped connection would.
    pub fn fail_next_set_active(&self) {
        self.set_active_fails.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        active: bool,
    ) -> Result<Account, AccountError> {
        if !EmailAddress::is_valid(email) {
            return Err(AccountError::InvalidEmail);
        }
        if password.trim().is_empty() {
            return Err(AccountError::WeakPassword);
        }

        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|a| a.username == username) {
            return Err(AccountError::DuplicateUsername);
        }

        let account = Account {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: username.to_owned(),
            email: email.to_owned(),
            active,
        };
        rows.push(account.clone());
        Ok(account)
    }

    async fn get(&self, username: &str) -> anyhow::Result<Option<Account>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn get_by_id(&self, id: i32) -> anyhow::Result<Option<Account>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn set_active(&self, id: i32, active: bool) -> anyhow::Result<()> {
        if self.set_active_fails.swap(false, Ordering::SeqCst) {
            anyhow::bail!("database connection lost");
        }
        for account in self.rows.lock().unwrap().iter_mut() {
            if account.id == id {
                account.active = active;
            }
        }
        Ok(())
    }
}

pub struct MemoryKeyRepo {
    rows: Mutex<Vec<ActivationKey>>,
}

impl MemoryKeyRepo {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ActivationKeyRepo for MemoryKeyRepo {
    async fn get_for_account(&self, account_id: i32) -> anyhow::Result<Option<ActivationKey>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.account_id == account_id)
            .cloned())
    }

    async fn get_by_token(&self, token: &str) -> anyhow::Result<Option<ActivationKey>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.token == token)
            .cloned())
    }

    async fn insert(&self, key: &ActivationKey, force: bool) -> anyhow::Result<InsertOutcome> {
        let mut rows = self.rows.lock().unwrap();

        let has_existing = rows.iter().any(|k| k.account_id == key.account_id);
        if has_existing && !force {
            let existing = rows
                .iter()
                .find(|k| k.account_id == key.account_id)
                .unwrap()
                .clone();
            return Ok(InsertOutcome::Existing(existing));
        }

        // token must be unique across all other outstanding rows
        if rows
            .iter()
            .any(|k| k.token == key.token && k.account_id != key.account_id)
        {
            return Ok(InsertOutcome::TokenTaken);
        }

        if has_existing {
            let row = rows
                .iter_mut()
                .find(|k| k.account_id == key.account_id)
                .unwrap();
            row.token = key.token.clone();
            row.expires = key.expires;
            Ok(InsertOutcome::Stored(row.clone()))
        } else {
            rows.push(key.clone());
            Ok(InsertOutcome::Stored(key.clone()))
        }
    }

    async fn delete_by_token(&self, token: &str) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|k| k.token != token);
        Ok(rows.len() < before)
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Hands out queued token values first, then falls back to counted ones.
pub struct QueuedTokens {
    queued: Mutex<VecDeque<String>>,
    counter: AtomicUsize,
}

impl QueuedTokens {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn queue(&self, token: &str) {
        self.queued.lock().unwrap().push_back(token.to_owned());
    }
}

impl TokenGenerator for QueuedTokens {
    fn random_hex(&self, _len: usize) -> String {
        if let Some(token) = self.queued.lock().unwrap().pop_front() {
            return token;
        }
        format!("token-{}", self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
}

pub struct MemoryMailSender {
    sent: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl MemoryMailSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

impl MailSender for MemoryMailSender {
    fn send(&self, subject: &str, body: &str, from: &str, to: &[String]) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("smtp connection refused");
        }
        self.sent.lock().unwrap().push(SentMail {
            subject: subject.to_owned(),
            body: body.to_owned(),
            from: from.to_owned(),
            to: to.to_vec(),
        });
        Ok(())
    }
}

/// Fully wired workflows over the in-memory collaborators.
pub struct Fixture {
    pub accounts: Arc<MemoryAccountStore>,
    pub repo: Arc<MemoryKeyRepo>,
    pub clock: Arc<FixedClock>,
    pub tokens: Arc<QueuedTokens>,
    pub mailer: Arc<MemoryMailSender>,
    pub site: Arc<StaticSiteConfig>,
    pub bus: Arc<EventBus>,
    pub keys: Arc<ActivationKeyStore>,
    pub registration: RegistrationWorkflow,
    pub confirmation: ConfirmationWorkflow,
    pub config: AuthConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::default())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let accounts = Arc::new(MemoryAccountStore::new());
        let repo = Arc::new(MemoryKeyRepo::new());
        let clock = Arc::new(FixedClock::new());
        let tokens = Arc::new(QueuedTokens::new());
        let mailer = Arc::new(MemoryMailSender::new());
        let site = Arc::new(StaticSiteConfig::new("testserver".to_owned()));
        let bus = Arc::new(EventBus::new());

        let keys = Arc::new(ActivationKeyStore::new(
            repo.clone(),
            accounts.clone(),
            clock.clone(),
            tokens.clone(),
        ));
        let registration =
            RegistrationWorkflow::new(accounts.clone(), keys.clone(), bus.clone());
        let confirmation =
            ConfirmationWorkflow::new(keys.clone(), accounts.clone(), config.clone());

        Self {
            accounts,
            repo,
            clock,
            tokens,
            mailer,
            site,
            bus,
            keys,
            registration,
            confirmation,
            config,
        }
    }
}
