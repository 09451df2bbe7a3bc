use std::sync::Arc;

use async_trait::async_trait;

use super::events::{RegistrationCompleted, RegistrationListener};
use super::keys::ActivationKeyStore;
use super::mail::MailSender;
use super::{AuthConfig, SiteConfig};

/// Reacts to completed registrations: mails the confirmation link to the new
/// user and, when the deployment does not auto-approve, tells the admins.
/// Attached to the event bus by the composition root, not by default.
pub struct NotificationDispatcher {
    keys: Arc<ActivationKeyStore>,
    mailer: Arc<dyn MailSender>,
    site: Arc<dyn SiteConfig>,
    config: AuthConfig,
}

impl NotificationDispatcher {
    pub fn new(
        keys: Arc<ActivationKeyStore>,
        mailer: Arc<dyn MailSender>,
        site: Arc<dyn SiteConfig>,
        config: AuthConfig,
    ) -> Self {
        Self {
            keys,
            mailer,
            site,
            config,
        }
    }

    async fn send_confirmation_email(&self, event: &RegistrationCompleted) {
        let account = &event.account;

        let key = match self.keys.get(account).await {
            Ok(Some(key)) => key,
            Ok(None) => {
                tracing::warn!(
                    "no activation key on file for ({}), skipping confirmation mail",
                    account.username
                );
                return;
            }
            Err(err) => {
                tracing::warn!("activation key lookup failed: {err:?}");
                return;
            }
        };

        let domain = self.site.current_domain();
        let confirm_url = format!("http://{}/confirm/{}", domain, key.token);
        let subject = format!(
            "{}Your new {} account confirmation",
            self.config.subject_prefix, domain
        );
        let body = format!(
            "Welcome, {}, and thanks for signing up for an {} account!\n\n\n{}\n",
            account.username, domain, confirm_url
        );

        if let Err(err) = self.mailer.send(
            &subject,
            &body,
            &self.config.from_address,
            &[account.email.clone()],
        ) {
            // mail failure never undoes the registration
            tracing::warn!("confirmation mail to ({}) failed: {err:?}", account.email);
        }
    }

    fn notify_admins(&self, event: &RegistrationCompleted) {
        let recipients: Vec<String> = self
            .config
            .admins
            .iter()
            .map(|admin| admin.email.clone())
            .collect();
        if recipients.is_empty() {
            return;
        }

        let body = format!(
            "Dear Administrator,\nsomebody just registered an account with username {} at your {}\ninstance and is awaiting your approval!\n",
            event.account.username,
            self.site.current_domain()
        );

        if let Err(err) = self.mailer.send(
            "New user awaiting approval",
            &body,
            &self.config.from_address,
            &recipients,
        ) {
            tracing::warn!("admin notification mail failed: {err:?}");
        }
    }
}

#[async_trait]
impl RegistrationListener for NotificationDispatcher {
    async fn on_registration_completed(&self, event: &RegistrationCompleted) {
        self.send_confirmation_email(event).await;

        if !self.config.auto_approve_new_users {
            self.notify_admins(event);
        }
    }
}
