use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use aegis_core::AppError;

mod types;

pub use types::ErrorResponse;

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AppError::Validation(_) | AppError::CaptchaRequired => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_)
            | AppError::MfaRequired
            | AppError::TokenReplay
            | AppError::SessionAbsolutelyExpired => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::AccountLocked { .. } => StatusCode::LOCKED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Replay detection and absolute session expiry are reported with
        // the same generic body as any other invalid token, so an attacker
        // probing with a stolen refresh token cannot tell it was noticed.
        let message = match &self.0 {
            AppError::TokenReplay | AppError::SessionAbsolutelyExpired => {
                "token is invalid or expired".to_owned()
            }
            AppError::AccountLocked { .. } => "account is temporarily locked".to_owned(),
            other => other.to_string(),
        };
        let payload = Json(ErrorResponse::new(message));

        match self.0 {
            AppError::AccountLocked {
                retry_after_seconds,
            } => (
                status,
                [("retry-after", retry_after_seconds.to_string())],
                payload,
            )
                .into_response(),
            // OWASP: include Retry-After header on 429 responses.
            AppError::RateLimited(_) => {
                (status, [("retry-after", "60".to_owned())], payload).into_response()
            }
            _ => (status, payload).into_response(),
        }
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
