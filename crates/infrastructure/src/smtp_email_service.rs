//! SMTP email transport for reset-mail delivery, via `lettre`.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use aegis_application::EmailService;
use aegis_core::{AppError, AppResult};

/// Connection settings for the SMTP relay.
#[derive(Clone)]
pub struct SmtpEmailConfig {
    /// Relay hostname.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Relay username.
    pub username: String,
    /// Relay password.
    pub password: String,
    /// Sender address stamped on every message.
    pub from_address: String,
}

/// Email transport delivering through an authenticated SMTP relay.
///
/// The relay transport and sender mailbox are built once here, so a bad
/// hostname or malformed `SMTP_FROM_ADDRESS` fails at startup instead
/// of on the first password-reset request days later.
#[derive(Clone)]
pub struct SmtpEmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailService {
    /// Creates a transport for the configured relay.
    pub fn new(config: SmtpEmailConfig) -> AppResult<Self> {
        let from = config
            .from_address
            .parse()
            .map_err(|error| AppError::Validation(format!("invalid SMTP_FROM_ADDRESS: {error}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|error| AppError::Internal(format!("failed to create SMTP transport: {error}")))?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        _html_body: Option<&str>,
    ) -> AppResult<()> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|error| AppError::Validation(format!("invalid recipient address: {error}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(text_body.to_owned())
            .map_err(|error| AppError::Internal(format!("failed to build email: {error}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|error| AppError::Internal(format!("failed to send email: {error}")))?;

        Ok(())
    }
}
