//! CAPTCHA verification, used to gate login attempts once a tenant's
//! failure count crosses the CAPTCHA threshold.
//!
//! Supports reCAPTCHA v3 and hCaptcha, matching the two providers a CAPTCHA
//! adapter is expected to speak; the actual HTTP call to the provider lives
//! behind [`CaptchaVerifier`] in the infrastructure crate.

use std::sync::Arc;

use async_trait::async_trait;

use aegis_core::{AppError, AppResult};

/// Result of a successful CAPTCHA verification call.
#[derive(Debug, Clone, Default)]
pub struct CaptchaOutcome {
    /// reCAPTCHA v3 risk score in `[0.0, 1.0]`; absent for hCaptcha.
    pub score: Option<f64>,
    /// The action name the provider recorded, for reCAPTCHA v3.
    pub action: Option<String>,
}

/// Port to a third-party CAPTCHA verification provider.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Verifies a CAPTCHA response token with the provider, given the
    /// client's IP address for additional provider-side risk signal.
    ///
    /// Returns `Err` when the provider rejects the token outright; a low
    /// reCAPTCHA score is reported via `Ok` and evaluated by the caller
    /// against its own threshold, since "too risky" is a policy decision,
    /// not a transport failure.
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> AppResult<CaptchaOutcome>;
}

/// Application service wrapping CAPTCHA enforcement policy.
#[derive(Clone)]
pub struct CaptchaService {
    verifier: Option<Arc<dyn CaptchaVerifier>>,
    score_threshold: f64,
}

impl CaptchaService {
    /// Creates a CAPTCHA service backed by a verifier, enforcing the given
    /// minimum reCAPTCHA v3 score (ignored for hCaptcha responses, which do
    /// not carry a score).
    #[must_use]
    pub fn new(verifier: Arc<dyn CaptchaVerifier>, score_threshold: f64) -> Self {
        Self {
            verifier: Some(verifier),
            score_threshold,
        }
    }

    /// Creates a CAPTCHA service with verification disabled. Used in
    /// environments (tests, local development) where no provider is
    /// configured; every challenge is accepted without a round trip.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            verifier: None,
            score_threshold: 0.0,
        }
    }

    /// Returns whether this service actually calls out to a provider.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    /// Verifies a CAPTCHA response when required by the caller's gate
    /// decision. When `required` is `false` and no token is present, this
    /// is a no-op success; a `required` check with a missing token is
    /// always rejected.
    pub async fn verify_if_required(
        &self,
        token: Option<&str>,
        remote_ip: Option<&str>,
        required: bool,
    ) -> AppResult<()> {
        let Some(verifier) = self.verifier.as_ref() else {
            return Ok(());
        };

        let Some(token) = token else {
            return if required {
                Err(AppError::CaptchaRequired)
            } else {
                Ok(())
            };
        };

        let outcome = verifier.verify(token, remote_ip).await?;

        if let Some(score) = outcome.score {
            if score < self.score_threshold {
                return Err(AppError::CaptchaRequired);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysPasses;

    #[async_trait]
    impl CaptchaVerifier for AlwaysPasses {
        async fn verify(&self, _token: &str, _remote_ip: Option<&str>) -> AppResult<CaptchaOutcome> {
            Ok(CaptchaOutcome { score: Some(0.9), action: Some("login".to_owned()) })
        }
    }

    struct LowScore;

    #[async_trait]
    impl CaptchaVerifier for LowScore {
        async fn verify(&self, _token: &str, _remote_ip: Option<&str>) -> AppResult<CaptchaOutcome> {
            Ok(CaptchaOutcome { score: Some(0.1), action: None })
        }
    }

    #[tokio::test]
    async fn disabled_service_always_passes() {
        let service = CaptchaService::disabled();
        assert!(service.verify_if_required(None, None, true).await.is_ok());
    }

    #[tokio::test]
    async fn required_without_token_is_rejected() {
        let service = CaptchaService::new(Arc::new(AlwaysPasses), 0.5);
        let result = service.verify_if_required(None, None, true).await;
        assert!(matches!(result, Err(AppError::CaptchaRequired)));
    }

    #[tokio::test]
    async fn not_required_without_token_passes() {
        let service = CaptchaService::new(Arc::new(AlwaysPasses), 0.5);
        assert!(service.verify_if_required(None, None, false).await.is_ok());
    }

    #[tokio::test]
    async fn low_score_is_rejected() {
        let service = CaptchaService::new(Arc::new(LowScore), 0.5);
        let result = service.verify_if_required(Some("token"), None, true).await;
        assert!(matches!(result, Err(AppError::CaptchaRequired)));
    }
}
