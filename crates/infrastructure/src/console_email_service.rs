//! Log-only email transport for local development.
//!
//! Password-reset mail is the only mail this system sends, and in local
//! development the reset token has to surface somewhere the developer
//! can copy it from. With no SMTP relay configured, that place is the
//! server log.

use async_trait::async_trait;
use aegis_application::EmailService;
use aegis_core::AppResult;
use tracing::info;

/// Email transport that logs instead of sending. Never use outside
/// development: the logged body contains the raw reset token.
#[derive(Clone)]
pub struct ConsoleEmailService;

impl ConsoleEmailService {
    /// Creates a new console email transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleEmailService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailService for ConsoleEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        _html_body: Option<&str>,
    ) -> AppResult<()> {
        info!(to, subject, body = text_body, "email logged instead of sent (console transport)");
        Ok(())
    }
}
