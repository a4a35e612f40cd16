//! TOTP provider implementation using the `totp-rs` crate.

use aegis_application::{GeneratedTotpSecret, TotpProvider, constant_time_eq};
use aegis_core::{AppError, AppResult};
use aegis_domain::{TOTP_STEP_SECONDS, TOTP_WINDOW_STEPS};
use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

/// TOTP provider with RFC 6238 compliance, issuing and checking 6-digit,
/// 30-second codes with a +/-1 step tolerance.
#[derive(Clone)]
pub struct TotpRsProvider {
    issuer: String,
}

impl TotpRsProvider {
    /// Creates a new TOTP provider. `issuer` is embedded in the
    /// `otpauth://` URI so authenticator apps label the entry correctly.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into() }
    }

    fn totp_for(&self, secret_bytes: &[u8], account_name: String) -> AppResult<TOTP> {
        TOTP::new(Algorithm::SHA1, 6, 1, TOTP_STEP_SECONDS, secret_bytes.to_vec(), Some(self.issuer.clone()), account_name)
            .map_err(|error| AppError::Internal(format!("failed to create TOTP instance: {error}")))
    }
}

impl TotpProvider for TotpRsProvider {
    fn generate_secret(&self, email: &str) -> AppResult<GeneratedTotpSecret> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret.to_bytes().map_err(|error| AppError::Internal(format!("failed to generate TOTP secret: {error}")))?;

        let totp = self.totp_for(&secret_bytes, email.to_owned())?;
        let base32 = secret.to_encoded().to_string();
        let otpauth_uri = totp.get_url();
        let qr_png_base64 = totp
            .get_qr_base64()
            .map_err(|error| AppError::Internal(format!("failed to render TOTP QR code: {error}")))?;

        Ok(GeneratedTotpSecret { secret_bytes, base32, otpauth_uri, qr_png_base64 })
    }

    fn verify_code(&self, secret_bytes: &[u8], code: &str, now: DateTime<Utc>) -> AppResult<Option<i64>> {
        let totp = self.totp_for(secret_bytes, String::new())?;
        let current_counter = now.timestamp() / TOTP_STEP_SECONDS as i64;

        for offset in -TOTP_WINDOW_STEPS..=TOTP_WINDOW_STEPS {
            let counter = current_counter + offset;
            if counter < 0 {
                continue;
            }
            let step_time = (counter as u64) * TOTP_STEP_SECONDS;
            let candidate = totp.generate(step_time);
            if constant_time_eq(candidate.as_bytes(), code.as_bytes()) {
                return Ok(Some(counter));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_verifies_its_own_current_code() {
        let provider = TotpRsProvider::new("Aegis");
        let generated = provider.generate_secret("user@example.com").unwrap_or_else(|_| panic!("test"));
        assert!(generated.otpauth_uri.starts_with("otpauth://totp/"));
        assert!(!generated.qr_png_base64.is_empty());

        let now = Utc::now();
        let totp = provider.totp_for(&generated.secret_bytes, String::new()).unwrap_or_else(|_| panic!("test"));
        let code = totp.generate(now.timestamp() as u64);

        let result = provider.verify_code(&generated.secret_bytes, &code, now).unwrap_or_else(|_| panic!("test"));
        assert!(result.is_some());
    }

    #[test]
    fn wrong_code_is_rejected() {
        let provider = TotpRsProvider::new("Aegis");
        let generated = provider.generate_secret("user@example.com").unwrap_or_else(|_| panic!("test"));

        let now = Utc::now();
        let totp = provider.totp_for(&generated.secret_bytes, String::new()).unwrap_or_else(|_| panic!("test"));
        let real_code = totp.generate(now.timestamp() as u64);
        let wrong_code: String = real_code.chars().map(|digit| if digit == '0' { '1' } else { '0' }).collect();

        let result = provider.verify_code(&generated.secret_bytes, &wrong_code, now).unwrap_or_else(|_| panic!("test"));
        assert!(result.is_none());
    }
}
