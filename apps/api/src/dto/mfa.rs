use serde::{Deserialize, Serialize};

/// TOTP enrollment material, shown exactly once.
#[derive(Debug, Serialize)]
pub struct MfaEnrollmentResponse {
    pub secret_base32: String,
    pub otpauth_uri: String,
    /// Base64-encoded PNG QR code of the otpauth URI.
    pub qr_png_base64: String,
    pub recovery_codes: Vec<String>,
}

/// Incoming payload for confirming a pending TOTP enrollment.
#[derive(Debug, Deserialize)]
pub struct MfaConfirmRequest {
    pub code: String,
}

/// Incoming payload for disabling TOTP. Requires password re-authentication.
#[derive(Debug, Deserialize)]
pub struct MfaDisableRequest {
    pub password: String,
}

/// Incoming payload for regenerating recovery codes.
#[derive(Debug, Deserialize)]
pub struct RegenerateRecoveryCodesRequest {
    pub password: String,
}

/// A fresh set of recovery codes, shown exactly once.
#[derive(Debug, Serialize)]
pub struct RecoveryCodesResponse {
    pub recovery_codes: Vec<String>,
}
