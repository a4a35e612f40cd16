//! hCaptcha verifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use aegis_application::{CaptchaOutcome, CaptchaVerifier};
use aegis_core::{AppError, AppResult};

const SITEVERIFY_URL: &str = "https://hcaptcha.com/siteverify";

/// Hard ceiling on the provider round trip. A timed-out verification
/// fails the login attempt closed rather than waiving the challenge.
const SITEVERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// CAPTCHA verifier backed by hCaptcha's siteverify endpoint.
///
/// hCaptcha has no risk-score concept, unlike reCAPTCHA v3: a verified
/// token is simply pass/fail, so [`CaptchaOutcome::score`] is always `None`.
#[derive(Clone)]
pub struct HcaptchaVerifier {
    client: reqwest::Client,
    secret: String,
}

impl HcaptchaVerifier {
    /// Creates a verifier for the given site secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SITEVERIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            secret: secret.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "error-codes")]
    error_codes: Option<Vec<String>>,
}

#[async_trait]
impl CaptchaVerifier for HcaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> AppResult<CaptchaOutcome> {
        let mut params = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            params.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(SITEVERIFY_URL)
            .form(&params)
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("failed to reach hCaptcha: {error}")))?;

        let body: SiteverifyResponse = response
            .json()
            .await
            .map_err(|error| AppError::Internal(format!("failed to parse hCaptcha response: {error}")))?;

        if !body.success {
            let reason = body.error_codes.unwrap_or_default().join(", ");
            return Err(AppError::Validation(format!("hCaptcha rejected the token: {reason}")));
        }

        Ok(CaptchaOutcome { score: None, action: None })
    }
}
