use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use aegis_application::ConcurrentSessionPolicy;
use aegis_core::AppError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct SmtpRuntimeConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    Console,
    Smtp(SmtpRuntimeConfig),
}

#[derive(Debug, Clone)]
pub enum CaptchaProviderConfig {
    None,
    Recaptcha {
        secret: String,
        site_key: String,
        score_threshold: f64,
    },
    Hcaptcha {
        secret: String,
        site_key: String,
    },
}

impl CaptchaProviderConfig {
    pub fn site_key(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Recaptcha { site_key, .. } | Self::Hcaptcha { site_key, .. } => {
                Some(site_key.as_str())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub jwt_secret: String,
    /// Hex-encoded 32-byte AES key for TOTP secrets at rest; decoded and
    /// validated when the encryptor is built.
    pub totp_encryption_key: String,
    pub totp_issuer: String,
    pub email_provider: EmailProviderConfig,
    pub captcha_provider: CaptchaProviderConfig,
    pub bootstrap_token: Option<String>,
    /// `APP_ENV=test` disables lockout and CAPTCHA gating so end-to-end
    /// suites can drive the login flow without farming CAPTCHA tokens.
    /// Must never be set in production.
    pub test_mode: bool,
    pub max_active_sessions: Option<usize>,
    pub session_eviction_policy: ConcurrentSessionPolicy,
    /// When set, accounts with an unverified email cannot log in; the
    /// rejection is indistinguishable from a wrong password.
    pub email_verification_required: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let jwt_secret = required_env("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT_SECRET must be at least 32 characters".to_owned(),
            ));
        }

        let totp_encryption_key = required_non_empty_env("TOTP_ENCRYPTION_KEY")?;
        let totp_issuer = env::var("TOTP_ISSUER").unwrap_or_else(|_| "Aegis".to_owned());

        let email_provider = match env::var("EMAIL_PROVIDER")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "console" => EmailProviderConfig::Console,
            "smtp" => {
                let port = required_non_empty_env("SMTP_PORT")?
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;
                EmailProviderConfig::Smtp(SmtpRuntimeConfig {
                    host: required_non_empty_env("SMTP_HOST")?,
                    port,
                    username: required_non_empty_env("SMTP_USERNAME")?,
                    password: required_non_empty_env("SMTP_PASSWORD")?,
                    from_address: required_non_empty_env("SMTP_FROM_ADDRESS")?,
                })
            }
            other => {
                return Err(AppError::Validation(format!(
                    "EMAIL_PROVIDER must be either 'console' or 'smtp', got '{other}'"
                )));
            }
        };

        let captcha_provider = match env::var("CAPTCHA_PROVIDER")
            .unwrap_or_else(|_| "none".to_owned())
            .as_str()
        {
            "none" => CaptchaProviderConfig::None,
            "recaptcha" => CaptchaProviderConfig::Recaptcha {
                secret: required_non_empty_env("CAPTCHA_SECRET")?,
                site_key: required_non_empty_env("CAPTCHA_SITE_KEY")?,
                score_threshold: parse_env_f64("CAPTCHA_SCORE_THRESHOLD", 0.5)?,
            },
            "hcaptcha" => CaptchaProviderConfig::Hcaptcha {
                secret: required_non_empty_env("CAPTCHA_SECRET")?,
                site_key: required_non_empty_env("CAPTCHA_SITE_KEY")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "CAPTCHA_PROVIDER must be 'none', 'recaptcha', or 'hcaptcha', got '{other}'"
                )));
            }
        };

        let bootstrap_token = env::var("AUTH_BOOTSTRAP_TOKEN")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let test_mode = env::var("APP_ENV")
            .map(|value| value.eq_ignore_ascii_case("test"))
            .unwrap_or(false);

        let max_active_sessions = match env::var("MAX_ACTIVE_SESSIONS") {
            Ok(value) => Some(value.parse::<usize>().map_err(|error| {
                AppError::Validation(format!("invalid MAX_ACTIVE_SESSIONS value '{value}': {error}"))
            })?),
            Err(_) => None,
        };

        let email_verification_required = env::var("EMAIL_VERIFICATION_REQUIRED")
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let session_eviction_policy = match env::var("SESSION_EVICTION_POLICY")
            .unwrap_or_else(|_| "evict-oldest".to_owned())
            .as_str()
        {
            "reject" => ConcurrentSessionPolicy::Reject,
            "evict-oldest" => ConcurrentSessionPolicy::EvictOldest,
            other => {
                return Err(AppError::Validation(format!(
                    "SESSION_EVICTION_POLICY must be 'reject' or 'evict-oldest', got '{other}'"
                )));
            }
        };

        Ok(Self {
            database_url,
            redis_url,
            frontend_url,
            api_host,
            api_port,
            jwt_secret,
            totp_encryption_key,
            totp_issuer,
            email_provider,
            captcha_provider,
            bootstrap_token,
            test_mode,
            max_active_sessions,
            session_eviction_policy,
            email_verification_required,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_env_f64(name: &str, default: f64) -> Result<f64, AppError> {
    match env::var(name) {
        Ok(value) => value.parse::<f64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_env_f64;

    #[test]
    fn env_f64_falls_back_to_default_when_unset() {
        let value = parse_env_f64("AEGIS_TEST_UNSET_THRESHOLD", 0.5);
        assert_eq!(value.unwrap_or_else(|_| panic!("test")), 0.5);
    }
}
