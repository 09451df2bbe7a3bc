use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::keys::{ActivationKey, ActivationKeyRepo, InsertOutcome};
use crate::data::account::is_unique_violation;

const TOKEN_UNIQUE_CONSTRAINT: &str = "activation_keys_activation_key_key";

/// Postgres rows for outstanding activation keys. The `user_id` primary key
/// is what enforces one key per account; `activation_key` is unique so a
/// token identifies at most one row.
pub struct PgActivationKeyRepo {
    pool: PgPool,
}

impl PgActivationKeyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query(
            "
        CREATE TABLE IF NOT EXISTS activation_keys (
            user_id INT PRIMARY KEY,
            activation_key TEXT UNIQUE NOT NULL,
            key_expires TIMESTAMPTZ NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id)
        );",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

const SELECT_COLUMNS: &str =
    "user_id AS account_id, activation_key AS token, key_expires AS expires";

#[async_trait]
impl ActivationKeyRepo for PgActivationKeyRepo {
    async fn get_for_account(&self, account_id: i32) -> anyhow::Result<Option<ActivationKey>> {
        let key = sqlx::query_as::<_, ActivationKey>(&format!(
            "SELECT {SELECT_COLUMNS} FROM activation_keys WHERE user_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn get_by_token(&self, token: &str) -> anyhow::Result<Option<ActivationKey>> {
        let key = sqlx::query_as::<_, ActivationKey>(&format!(
            "SELECT {SELECT_COLUMNS} FROM activation_keys WHERE activation_key = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn insert(&self, key: &ActivationKey, force: bool) -> anyhow::Result<InsertOutcome> {
        // a single upsert keeps concurrent re-issues from producing two rows
        let statement = if force {
            format!(
                "INSERT INTO activation_keys (user_id, activation_key, key_expires)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (user_id) DO UPDATE
                 SET activation_key = EXCLUDED.activation_key,
                     key_expires = EXCLUDED.key_expires
                 RETURNING {SELECT_COLUMNS}"
            )
        } else {
            format!(
                "INSERT INTO activation_keys (user_id, activation_key, key_expires)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (user_id) DO NOTHING
                 RETURNING {SELECT_COLUMNS}"
            )
        };

        let inserted = sqlx::query_as::<_, ActivationKey>(&statement)
            .bind(key.account_id)
            .bind(&key.token)
            .bind(key.expires)
            .fetch_optional(&self.pool)
            .await;

        match inserted {
            Ok(Some(stored)) => Ok(InsertOutcome::Stored(stored)),
            // DO NOTHING returned no row, the account already has a key
            Ok(None) => match self.get_for_account(key.account_id).await? {
                Some(existing) => Ok(InsertOutcome::Existing(existing)),
                // raced with a delete; let the store retry the insert
                None => Ok(InsertOutcome::TokenTaken),
            },
            Err(err) if is_unique_violation(&err, TOKEN_UNIQUE_CONSTRAINT) => {
                Ok(InsertOutcome::TokenTaken)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_by_token(&self, token: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM activation_keys WHERE activation_key = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
