use std::{net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use auth::confirm::ConfirmationWorkflow;
use auth::events::EventBus;
use auth::keys::{ActivationKeyRepo, ActivationKeyStore};
use auth::mail::SmtpMailSender;
use auth::notify::NotificationDispatcher;
use auth::register::RegistrationWorkflow;
use auth::{AdminContact, AuthConfig, SecureTokenGenerator, StaticSiteConfig, SystemClock};
use data::account::{AccountStore, PgAccountStore};
use data::activation_key::PgActivationKeyRepo;
use data::app_state::AppStateInner;

mod api;
mod auth;
mod data;
mod utils;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "registration_app=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().unwrap();

    let pool = data::database_init().await.unwrap();

    data::init_tables(&pool).await.unwrap();

    let config = AuthConfig {
        auto_approve_new_users: dotenvy::var("AUTO_APPROVE_NEW_USERS")
            .map(|v| v != "false")
            .unwrap_or(true),
        admins: parse_admins(&dotenvy::var("ADMINS").unwrap_or_default()),
        from_address: dotenvy::var("MAIL_FROM")
            .unwrap_or_else(|_| "webmaster@localhost".to_owned()),
        subject_prefix: dotenvy::var("EMAIL_SUBJECT_PREFIX").unwrap_or_default(),
    };

    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));
    let key_repo: Arc<dyn ActivationKeyRepo> = Arc::new(PgActivationKeyRepo::new(pool.clone()));
    let keys = Arc::new(ActivationKeyStore::new(
        key_repo,
        accounts.clone(),
        Arc::new(SystemClock),
        Arc::new(SecureTokenGenerator),
    ));
    let bus = Arc::new(EventBus::new());
    let site = Arc::new(StaticSiteConfig::new(
        dotenvy::var("DOMAIN").unwrap_or_else(|_| "127.0.0.1:3000".to_owned()),
    ));

    // the dispatcher is opt-in; registration itself works without it
    if dotenvy::var("NOTIFY_REGISTRATIONS")
        .map(|v| v == "true")
        .unwrap_or(false)
    {
        let mailer = Arc::new(SmtpMailSender::from_env().unwrap());
        bus.subscribe(Arc::new(NotificationDispatcher::new(
            keys.clone(),
            mailer,
            site.clone(),
            config.clone(),
        )));
    }

    let app_state = Arc::new(AppStateInner {
        registration: RegistrationWorkflow::new(accounts.clone(), keys.clone(), bus.clone()),
        confirmation: ConfirmationWorkflow::new(keys, accounts, config.clone()),
        config,
    });

    let app = Router::new()
        .route("/confirm/:key", get(api::auth::confirm))
        .nest("/api", api::api_routes())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}

/// Parses `ADMINS`, a comma separated list of `Name:email` pairs.
fn parse_admins(raw: &str) -> Vec<AdminContact> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, email) = entry.split_once(':')?;
            let (name, email) = (name.trim(), email.trim());
            if name.is_empty() || email.is_empty() {
                return None;
            }
            Some(AdminContact {
                name: name.to_owned(),
                email: email.to_owned(),
            })
        })
        .collect()
}
