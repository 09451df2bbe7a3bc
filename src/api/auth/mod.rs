use axum::{
    extract::{Path, State},
    response::Html,
    routing::post,
    Form, Router,
};
use http::StatusCode;
use serde::Deserialize;

use crate::auth::confirm::ConfirmationOutcome;
use crate::auth::AdminContact;
use crate::data::account::AccountError;
use crate::data::app_state::AppState;
use crate::utils::ToServerError;

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/register", post(register))
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    username: String,
    email: String,
    password1: String,
    password2: String,
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Html<String>, (StatusCode, String)> {
    // check if passwords match
    if form.password1 != form.password2 {
        return Ok(Html("Your passwords must match.".to_owned()));
    }

    match state
        .registration
        .register(&form.username, &form.email, &form.password1)
        .await
    {
        Ok(account) => {
            tracing::debug!("registered new account ({})", account.username);
            if state.config.auto_approve_new_users {
                Ok(Html(
                    "Your account has been created, please check your mailbox for confirmation"
                        .to_owned(),
                ))
            } else {
                let mut page = String::from(
                    "Your account has been created, but you need an administrator to activate it",
                );
                for admin in &state.config.admins {
                    page.push_str(&format!("<br/>{}", mailto(admin)));
                }
                Ok(Html(page))
            }
        }
        Err(AccountError::Store(err)) => Err(err).server_error(),
        // validation failures render their own message
        Err(err) => Ok(Html(err.to_string())),
    }
}

pub async fn confirm(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, String)> {
    tracing::debug!("trying to confirm an activation key");

    let outcome = state.confirmation.confirm(&key).await.server_error()?;

    let mut page = outcome.message().to_owned();
    if let ConfirmationOutcome::AwaitingApproval(admins) = &outcome {
        for admin in admins {
            page.push_str(&format!("<br/>{}", mailto(admin)));
        }
    }
    Ok(Html(page))
}

fn mailto(admin: &AdminContact) -> String {
    format!("<a href=\"mailto:{}\">{}</a>", admin.email, admin.name)
}
