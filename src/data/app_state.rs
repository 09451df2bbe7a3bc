use std::sync::Arc;

use crate::auth::confirm::ConfirmationWorkflow;
use crate::auth::register::RegistrationWorkflow;
use crate::auth::AuthConfig;

pub struct AppStateInner {
    pub registration: RegistrationWorkflow,
    pub confirmation: ConfirmationWorkflow,
    pub config: AuthConfig,
}

pub type AppState = Arc<AppStateInner>;
