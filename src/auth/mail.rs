use lettre::{transport::smtp::authentication::Credentials, Message, SmtpTransport, Transport};

/// Outbound mail. Fire-and-forget from the workflows' point of view; a failed
/// send is reported by the caller, never rolled back into account state.
pub trait MailSender: Send + Sync {
    fn send(&self, subject: &str, body: &str, from: &str, to: &[String]) -> anyhow::Result<()>;
}

pub struct SmtpMailSender {
    transport: SmtpTransport,
}

impl SmtpMailSender {
    pub fn new(transport: SmtpTransport) -> Self {
        Self { transport }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let host = dotenvy::var("SMTP_HOST")?;
        let mut builder = SmtpTransport::relay(&host)?;
        if let (Ok(username), Ok(password)) =
            (dotenvy::var("SMTP_USERNAME"), dotenvy::var("SMTP_PASSWORD"))
        {
            builder = builder.credentials(Credentials::new(username, password));
        }
        Ok(Self::new(builder.build()))
    }
}

impl MailSender for SmtpMailSender {
    fn send(&self, subject: &str, body: &str, from: &str, to: &[String]) -> anyhow::Result<()> {
        let mut builder = Message::builder().from(from.parse()?).subject(subject);
        for recipient in to {
            builder = builder.to(recipient.parse()?);
        }
        let email = builder.body(body.to_owned())?;

        self.transport.send(&email)?;

        Ok(())
    }
}
