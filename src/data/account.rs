use async_trait::async_trait;
use email_address::EmailAddress;
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub active: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("A user with that username already exists.")]
    DuplicateUsername,
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Password is not strong enough.")]
    WeakPassword,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// The external user-account store. The core only needs this narrow slice of
/// it; authentication and sessions live elsewhere.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        active: bool,
    ) -> Result<Account, AccountError>;

    async fn get(&self, username: &str) -> anyhow::Result<Option<Account>>;

    async fn get_by_id(&self, id: i32) -> anyhow::Result<Option<Account>>;

    async fn set_active(&self, id: i32, active: bool) -> anyhow::Result<()>;
}

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query(
            "
        CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            active BOOLEAN NOT NULL DEFAULT FALSE
        );",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        active: bool,
    ) -> Result<Account, AccountError> {
        // check if email valid
        if !EmailAddress::is_valid(email) {
            return Err(AccountError::InvalidEmail);
        }
        // the forms in front of this enforce the real password policy
        if password.trim().is_empty() {
            return Err(AccountError::WeakPassword);
        }

        let password_hashed =
            bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(anyhow::Error::from)?;

        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO users(username, email, password_hash, active) VALUES ($1, $2, $3, $4)
             RETURNING id, username, email, active;",
        )
        .bind(username)
        .bind(email)
        .bind(password_hashed)
        .bind(active)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, "users_username_key") {
                AccountError::DuplicateUsername
            } else {
                AccountError::Store(err.into())
            }
        })?;

        Ok(account)
    }

    async fn get(&self, username: &str) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, email, active FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn get_by_id(&self, id: i32) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, email, active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn set_active(&self, id: i32, active: bool) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.constraint() == Some(constraint),
        _ => false,
    }
}
