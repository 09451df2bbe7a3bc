use sqlx::PgPool;

pub mod account;
pub mod activation_key;
pub mod app_state;

pub async fn database_init() -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(&dotenvy::var("DATABASE_URL")?).await?;
    Ok(pool)
}

pub async fn init_tables(pool: &PgPool) -> anyhow::Result<()> {
    account::PgAccountStore::init(pool).await?;
    activation_key::PgActivationKeyRepo::init(pool).await?;
    Ok(())
}
