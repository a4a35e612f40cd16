//! `jsonwebtoken`-backed [`TokenCodec`] implementation.
//!
//! All three token kinds share one HS256-signed wire format: a `type`
//! claim distinguishes an access token from a refresh token from an
//! MFA-session token, and every decode method rejects a token whose `type`
//! does not match what it was asked to decode, even if the signature is
//! otherwise valid.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use aegis_application::{
    AccessClaims, DecodedAccessToken, DecodedMfaSessionToken, DecodedRefreshToken, MfaSessionClaims, RefreshClaims, TokenCodec,
};
use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{SessionId, TokenId, UserId};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "type")]
    token_type: String,
    sub: uuid::Uuid,
    tenant_id: uuid::Uuid,
    session_id: uuid::Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    jti: Option<uuid::Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    iat: i64,
    exp: i64,
}

fn to_timestamp(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

fn from_timestamp(value: i64) -> AppResult<DateTime<Utc>> {
    Utc.timestamp_opt(value, 0)
        .single()
        .ok_or_else(|| AppError::Internal("token carried an out-of-range timestamp".to_owned()))
}

/// JWT codec signing and verifying with a single shared HS256 secret.
#[derive(Clone)]
pub struct JsonWebTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JsonWebTokenCodec {
    /// Creates a codec from a raw signing secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        validation
    }

    fn decode_claims(&self, token: &str, expected_type: &str) -> AppResult<Claims> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &Self::validation())
            .map_err(|error| AppError::Unauthorized(format!("invalid token: {error}")))?;

        if decoded.claims.token_type != expected_type {
            return Err(AppError::Unauthorized(format!(
                "expected a {expected_type} token, got {}",
                decoded.claims.token_type
            )));
        }

        Ok(decoded.claims)
    }
}

impl TokenCodec for JsonWebTokenCodec {
    fn encode_access(&self, claims: &AccessClaims) -> AppResult<String> {
        let wire = Claims {
            token_type: "access".to_owned(),
            sub: claims.user_id.as_uuid(),
            tenant_id: claims.tenant_id.as_uuid(),
            session_id: claims.session_id.as_uuid(),
            jti: None,
            email: Some(claims.email.clone()),
            iat: to_timestamp(claims.issued_at),
            exp: to_timestamp(claims.expires_at),
        };
        encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign access token: {error}")))
    }

    fn encode_refresh(&self, claims: &RefreshClaims) -> AppResult<String> {
        let wire = Claims {
            token_type: "refresh".to_owned(),
            sub: claims.user_id.as_uuid(),
            tenant_id: claims.tenant_id.as_uuid(),
            session_id: claims.session_id.as_uuid(),
            jti: Some(claims.jti.as_uuid()),
            email: Some(claims.email.clone()),
            iat: to_timestamp(claims.issued_at),
            exp: to_timestamp(claims.expires_at),
        };
        encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign refresh token: {error}")))
    }

    fn encode_mfa_session(&self, claims: &MfaSessionClaims) -> AppResult<String> {
        let wire = Claims {
            token_type: "mfa_session".to_owned(),
            sub: claims.user_id.as_uuid(),
            tenant_id: claims.tenant_id.as_uuid(),
            session_id: uuid::Uuid::nil(),
            jti: Some(claims.jti.as_uuid()),
            email: None,
            iat: to_timestamp(claims.issued_at),
            exp: to_timestamp(claims.expires_at),
        };
        encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign MFA session token: {error}")))
    }

    fn decode_access(&self, token: &str) -> AppResult<DecodedAccessToken> {
        let claims = self.decode_claims(token, "access")?;
        let email = claims.email.ok_or_else(|| AppError::Unauthorized("access token missing email claim".to_owned()))?;

        Ok(DecodedAccessToken {
            claims: AccessClaims {
                user_id: UserId::from_uuid(claims.sub),
                tenant_id: TenantId::from_uuid(claims.tenant_id),
                email,
                session_id: SessionId::from_uuid(claims.session_id),
                issued_at: from_timestamp(claims.iat)?,
                expires_at: from_timestamp(claims.exp)?,
            },
        })
    }

    fn decode_refresh(&self, token: &str) -> AppResult<DecodedRefreshToken> {
        let claims = self.decode_claims(token, "refresh")?;
        let email = claims.email.ok_or_else(|| AppError::Unauthorized("refresh token missing email claim".to_owned()))?;
        let jti = claims.jti.ok_or_else(|| AppError::Unauthorized("refresh token missing jti claim".to_owned()))?;

        Ok(DecodedRefreshToken {
            claims: RefreshClaims {
                jti: TokenId::from_uuid(jti),
                user_id: UserId::from_uuid(claims.sub),
                tenant_id: TenantId::from_uuid(claims.tenant_id),
                email,
                session_id: SessionId::from_uuid(claims.session_id),
                issued_at: from_timestamp(claims.iat)?,
                expires_at: from_timestamp(claims.exp)?,
            },
            raw: token.to_owned(),
        })
    }

    fn decode_mfa_session(&self, token: &str) -> AppResult<DecodedMfaSessionToken> {
        let claims = self.decode_claims(token, "mfa_session")?;
        let jti = claims.jti.ok_or_else(|| AppError::Unauthorized("MFA session token missing jti claim".to_owned()))?;

        Ok(DecodedMfaSessionToken {
            claims: MfaSessionClaims {
                jti: TokenId::from_uuid(jti),
                user_id: UserId::from_uuid(claims.sub),
                tenant_id: TenantId::from_uuid(claims.tenant_id),
                issued_at: from_timestamp(claims.iat)?,
                expires_at: from_timestamp(claims.exp)?,
            },
        })
    }
}
