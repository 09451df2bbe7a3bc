use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};

pub mod confirm;
pub mod events;
pub mod keys;
pub mod mail;
pub mod notify;
pub mod register;

#[cfg(test)]
pub mod testing;

/// Deployment policy and addresses the workflows need. Built once in main
/// from the environment and passed in, never looked up globally.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auto_approve_new_users: bool,
    pub admins: Vec<AdminContact>,
    pub from_address: String,
    pub subject_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auto_approve_new_users: true,
            admins: Vec::new(),
            from_address: "webmaster@localhost".to_owned(),
            subject_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContact {
    pub name: String,
    pub email: String,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub trait TokenGenerator: Send + Sync {
    /// Returns `len` hex characters from a cryptographically secure source.
    fn random_hex(&self, len: usize) -> String;
}

pub struct SecureTokenGenerator;

impl TokenGenerator for SecureTokenGenerator {
    fn random_hex(&self, len: usize) -> String {
        let mut bytes = vec![0u8; (len + 1) / 2];
        OsRng.fill_bytes(&mut bytes);
        let mut token = hex::encode(bytes);
        token.truncate(len);
        token
    }
}

pub trait SiteConfig: Send + Sync {
    /// Public domain used to build absolute confirmation links.
    fn current_domain(&self) -> String;
}

pub struct StaticSiteConfig {
    domain: String,
}

impl StaticSiteConfig {
    pub fn new(domain: String) -> Self {
        Self { domain }
    }
}

impl SiteConfig for StaticSiteConfig {
    fn current_domain(&self) -> String {
        self.domain.clone()
    }
}
