//! HS256 token signing and verification with per-class secrets.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use tokenward_core::config::AuthConfig;
use tokenward_core::error::{AppError, AuthFailure};
use tokenward_core::result::AppResult;

use super::claims::{ClaimSet, Claims, TokenType, UntrustedClaims};
use crate::time;

/// Signing material for one token class.
#[derive(Clone)]
struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl ClassKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// A freshly signed token and the payload it carries.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// Compact serialization.
    pub token: String,
    /// The signed payload.
    pub claims: Claims,
}

impl SignedToken {
    /// Expiry as a calendar instant.
    pub fn expires_at(&self) -> AppResult<DateTime<Utc>> {
        time::datetime_from_seconds(self.claims.exp)
    }
}

/// Creates and checks signed tokens.
///
/// Access and refresh tokens are signed with different secrets, so a token
/// of one class never verifies as the other.
#[derive(Clone)]
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access.ttl)
            .field("refresh_ttl", &self.refresh.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock instead.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            access: ClassKeys::new(&config.access_secret, config.access_ttl()),
            refresh: ClassKeys::new(&config.refresh_secret, config.refresh_ttl()),
            validation,
        }
    }

    fn keys(&self, typ: TokenType) -> &ClassKeys {
        match typ {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Configured lifetime of a token class.
    pub fn ttl(&self, typ: TokenType) -> Duration {
        self.keys(typ).ttl
    }

    /// Sign a claim set issued at `now_millis` (Unix milliseconds) with its
    /// class's secret and lifetime. `exp` counts from the whole second.
    pub fn sign(&self, set: ClaimSet, now_millis: i64) -> AppResult<SignedToken> {
        let keys = self.keys(set.typ);
        let exp = time::token_expiry(time::seconds_of_millis(now_millis), keys.ttl);
        let claims = Claims::stamp(set, now_millis, exp);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AppError::internal(format!("Failed to sign {} token: {e}", claims.typ)))?;

        Ok(SignedToken { token, claims })
    }

    /// Read a token's payload without checking signature or expiry.
    ///
    /// Returns `None` when the input is not a three-part token with a JSON
    /// object payload.
    pub fn decode(token: &str) -> Option<UntrustedClaims> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Check a token's signature with the secret of class `typ` and its
    /// expiry against `now` (Unix seconds).
    pub fn verify(&self, token: &str, typ: TokenType, now: i64) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.keys(typ).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::InvalidToken
                | JwtErrorKind::Base64(_)
                | JwtErrorKind::Json(_)
                | JwtErrorKind::Utf8(_) => AppError::unauthorized(AuthFailure::MalformedToken),
                _ => AppError::unauthorized(AuthFailure::InvalidToken),
            })?;

        let claims = data.claims;
        // Same-secret tokens of the other class cannot occur unless the
        // secrets were configured equal; reject them regardless.
        if claims.typ != typ {
            return Err(AppError::unauthorized(AuthFailure::InvalidToken));
        }
        if time::is_expired(claims.exp, now) {
            return Err(AppError::unauthorized(AuthFailure::ExpiredToken));
        }
        Ok(claims)
    }
}
