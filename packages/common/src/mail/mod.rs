mod error;
mod traits;

pub mod logging;
pub mod smtp;

use std::sync::Arc;

pub use error::MailError;
pub use traits::{EmailMessage, EmailSender};

use crate::config::MailConfig;

/// Construct the SMTP sender, or the logging sender when mail is disabled.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn EmailSender>, MailError> {
    if config.enabled {
        Ok(Arc::new(smtp::SmtpEmailSender::new(config)?))
    } else {
        Ok(Arc::new(logging::LoggingEmailSender))
    }
}
