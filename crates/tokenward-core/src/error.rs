//! Unified application error types for Tokenward.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Authentication rejections carry an
//! [`AuthFailure`] reason so operators can tell them apart, while
//! [`AppError::public_message`] keeps every reason indistinguishable to
//! end users.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Authentication failed (invalid credentials, expired token, etc.).
    Authentication,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (duplicate entry, concurrent modification, etc.).
    Conflict,
    /// An internal server error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A cache error occurred.
    Cache,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Cache => write!(f, "CACHE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
        }
    }
}

/// The precise reason an authentication attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, serde::Serialize, serde::Deserialize)]
pub enum AuthFailure {
    /// The authenticated identity handed to login is missing its id or roles.
    #[error("identity is incomplete")]
    InvalidIdentity,
    /// The token is missing required claims or cannot be parsed at all.
    #[error("token is malformed")]
    MalformedToken,
    /// The token signature does not verify with the expected secret.
    #[error("token signature is invalid")]
    InvalidToken,
    /// The token is past its `exp` instant.
    #[error("token has expired")]
    ExpiredToken,
    /// The session the token belongs to is no longer active.
    #[error("session has been revoked")]
    SessionRevoked,
    /// The token identifier has been revoked.
    #[error("token has been revoked")]
    TokenRevoked,
    /// The token was issued before the user's last password change.
    #[error("token was issued before the last password change")]
    TokenSuperseded,
    /// The token subject no longer exists.
    #[error("user not found")]
    UserNotFound,
    /// Username/password (or current password) did not match.
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// The unified application error used throughout Tokenward.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Authentication rejection reason, set only for `ErrorKind::Authentication`.
    pub auth: Option<AuthFailure>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            auth: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
            auth: None,
        }
    }

    /// Create an authentication error carrying a rejection reason.
    pub fn unauthorized(failure: AuthFailure) -> Self {
        Self {
            kind: ErrorKind::Authentication,
            message: failure.to_string(),
            source: None,
            auth: Some(failure),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// The authentication rejection reason, if this is one.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        self.auth
    }

    /// Whether the request was definitely rejected (as opposed to the
    /// outcome being undeterminable because a store failed).
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    /// Whether the error comes from an unavailable backing store.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self.kind, ErrorKind::Cache | ErrorKind::Database)
    }

    /// Message that is safe to return to an end user.
    pub fn public_message(&self) -> &str {
        match self.kind {
            ErrorKind::Authentication => "Unauthorized",
            ErrorKind::NotFound => "Not found",
            ErrorKind::Validation | ErrorKind::Conflict => &self.message,
            _ => "Internal server error",
        }
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
            auth: self.auth,
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        Self::unauthorized(failure)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_share_public_message() {
        let revoked = AppError::unauthorized(AuthFailure::SessionRevoked);
        let forged = AppError::unauthorized(AuthFailure::InvalidToken);
        assert_eq!(revoked.public_message(), forged.public_message());
        assert_eq!(revoked.auth_failure(), Some(AuthFailure::SessionRevoked));
        assert!(revoked.is_unauthorized());
    }

    #[test]
    fn test_store_errors_are_not_unauthorized() {
        let err = AppError::cache("connection refused");
        assert!(!err.is_unauthorized());
        assert!(err.is_infrastructure());
        assert_eq!(err.auth_failure(), None);
    }

    #[test]
    fn test_clone_keeps_reason() {
        let err: AppError = AuthFailure::TokenSuperseded.into();
        assert_eq!(err.clone().auth_failure(), Some(AuthFailure::TokenSuperseded));
    }
}
