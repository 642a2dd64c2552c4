use async_trait::async_trait;
use tracing::info;

use super::error::MailError;
use super::traits::{EmailMessage, EmailSender};

/// Sender used when SMTP is disabled: writes the message to the log instead.
#[derive(Debug, Default)]
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.html_body,
            "Email delivery disabled, logging message"
        );
        Ok(())
    }
}
