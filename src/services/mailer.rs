use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::AppConfig;
use crate::services::queue::QueuedStatusEmail;
use crate::services::template;

/// SMTP mailer for verification status notifications.
pub struct StatusMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
}

impl StatusMailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_email: config.from_email().to_string(),
        })
    }

    /// Send one status email. Best effort: every failure (unknown template,
    /// bad address, SMTP refusal) is logged as a warning naming the
    /// destination and then swallowed, so the job never re-runs.
    pub async fn send_status_email(&self, job: &QueuedStatusEmail) {
        if let Err(err) = self.try_send(job).await {
            metrics::counter!("status_emails_failed").increment(1);
            tracing::warn!(
                email = %job.email,
                error = %err,
                "Failure in sending verification status email"
            );
            return;
        }
        metrics::counter!("status_emails_sent").increment(1);
    }

    async fn try_send(&self, job: &QueuedStatusEmail) -> Result<(), MailError> {
        let body = template::render(&job.template, &job.email_vars)?;

        let from: Mailbox = self
            .from_email
            .parse()
            .map_err(|_| MailError::InvalidAddress(self.from_email.clone()))?;
        let to: Mailbox = job
            .email
            .parse()
            .map_err(|_| MailError::InvalidAddress(job.email.clone()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&job.subject)
            .body(body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error(transparent)]
    Template(#[from] template::TemplateError),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}
