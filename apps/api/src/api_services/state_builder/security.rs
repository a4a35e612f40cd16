use std::sync::Arc;

use aegis_application::{
    CaptchaService, EmailService, PasswordHasher, SecretEncryptor, TokenCodec, TotpProvider,
};
use aegis_core::AppError;
use aegis_infrastructure::{
    AesSecretEncryptor, Argon2PasswordHasher, ConsoleEmailService, HcaptchaVerifier,
    JsonWebTokenCodec, RecaptchaVerifier, SmtpEmailConfig, SmtpEmailService, TotpRsProvider,
};

use crate::api_config::{ApiConfig, CaptchaProviderConfig, EmailProviderConfig};

pub(super) struct SecurityComponents {
    pub(super) password_hasher: Arc<dyn PasswordHasher>,
    pub(super) token_codec: Arc<dyn TokenCodec>,
    pub(super) captcha_service: CaptchaService,
    pub(super) totp_provider: Arc<dyn TotpProvider>,
    pub(super) secret_encryptor: Arc<dyn SecretEncryptor>,
    pub(super) email_service: Arc<dyn EmailService>,
}

pub(super) fn build_security_components(
    config: &ApiConfig,
) -> Result<SecurityComponents, AppError> {
    let captcha_service = if config.test_mode {
        CaptchaService::disabled()
    } else {
        match &config.captcha_provider {
            CaptchaProviderConfig::None => CaptchaService::disabled(),
            CaptchaProviderConfig::Recaptcha {
                secret,
                score_threshold,
                ..
            } => CaptchaService::new(Arc::new(RecaptchaVerifier::new(secret)), *score_threshold),
            CaptchaProviderConfig::Hcaptcha { secret, .. } => {
                // hCaptcha responses carry no risk score; the threshold is
                // only consulted for reCAPTCHA outcomes.
                CaptchaService::new(Arc::new(HcaptchaVerifier::new(secret)), 0.0)
            }
        }
    };

    let email_service: Arc<dyn EmailService> = match &config.email_provider {
        EmailProviderConfig::Console => Arc::new(ConsoleEmailService::new()),
        EmailProviderConfig::Smtp(smtp) => Arc::new(SmtpEmailService::new(SmtpEmailConfig {
            host: smtp.host.clone(),
            port: smtp.port,
            username: smtp.username.clone(),
            password: smtp.password.clone(),
            from_address: smtp.from_address.clone(),
        })?),
    };

    Ok(SecurityComponents {
        password_hasher: Arc::new(Argon2PasswordHasher::new()),
        token_codec: Arc::new(JsonWebTokenCodec::new(config.jwt_secret.as_bytes())),
        captcha_service,
        totp_provider: Arc::new(TotpRsProvider::new(config.totp_issuer.clone())),
        secret_encryptor: Arc::new(AesSecretEncryptor::from_hex(&config.totp_encryption_key)?),
        email_service,
    })
}
