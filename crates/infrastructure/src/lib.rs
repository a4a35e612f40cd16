//! Infrastructure adapters for application ports.
//!
//! Every module here implements a trait from `aegis_application` against a
//! real backing technology (PostgreSQL, Redis, JWT, SMTP, an external
//! CAPTCHA provider). Nothing in this crate encodes business rules; it
//! only translates between the domain's types and the wire/storage format
//! a given technology expects.

#![forbid(unsafe_code)]

mod aes_secret_encryptor;
mod argon2_password_hasher;
mod console_email_service;
mod hcaptcha_verifier;
mod jsonwebtoken_codec;
mod postgres_api_key_repository;
mod postgres_audit_repository;
mod postgres_login_attempt_repository;
mod postgres_mfa_repository;
mod postgres_password_reset_repository;
mod postgres_rate_limit_repository;
mod postgres_session_repository;
mod postgres_tenant_repository;
mod postgres_token_repository;
mod postgres_user_repository;
mod recaptcha_verifier;
mod redis_rate_limit_repository;
mod smtp_email_service;
mod totp_provider;

pub use aes_secret_encryptor::AesSecretEncryptor;
pub use argon2_password_hasher::Argon2PasswordHasher;
pub use console_email_service::ConsoleEmailService;
pub use hcaptcha_verifier::HcaptchaVerifier;
pub use jsonwebtoken_codec::JsonWebTokenCodec;
pub use postgres_api_key_repository::PostgresApiKeyRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_login_attempt_repository::PostgresLoginAttemptRepository;
pub use postgres_mfa_repository::PostgresMfaRepository;
pub use postgres_password_reset_repository::PostgresPasswordResetRepository;
pub use postgres_rate_limit_repository::PostgresRateLimitRepository;
pub use postgres_session_repository::PostgresSessionRepository;
pub use postgres_tenant_repository::PostgresTenantRepository;
pub use postgres_token_repository::{PostgresRevokedTokenRepository, PostgresTokenRepository};
pub use postgres_user_repository::PostgresUserRepository;
pub use recaptcha_verifier::RecaptchaVerifier;
pub use redis_rate_limit_repository::RedisRateLimitRepository;
pub use smtp_email_service::{SmtpEmailConfig, SmtpEmailService};
pub use totp_provider::TotpRsProvider;
