//! Claim sets carried by access and refresh tokens.

use serde::{Deserialize, Serialize};

use tokenward_core::types::{SessionId, TokenId, UserId};
use tokenward_entity::user::Role;

use crate::time;

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer credential for API requests.
    Access,
    /// Long-lived credential exchanged for a new pair.
    Refresh,
}

impl TokenType {
    /// Lowercase name, as carried in the `typ` claim.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller decides about a token; the codec adds `iat` and `exp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    /// The user the token speaks for.
    pub sub: UserId,
    /// The session the token is bound to.
    pub session_id: SessionId,
    /// Unique id of this issuance.
    pub jti: TokenId,
    /// Role snapshot at issuance.
    pub roles: Vec<Role>,
    /// Token class.
    pub typ: TokenType,
    /// Display name, carried by access tokens only.
    pub full_name: Option<String>,
}

/// The full payload of a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject: the user id.
    pub sub: UserId,
    /// Session this token belongs to.
    pub session_id: SessionId,
    /// Token id, unique per issuance.
    pub jti: TokenId,
    /// Roles at issuance.
    pub roles: Vec<Role>,
    /// Token class.
    pub typ: TokenType,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Issued-at, Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat_ms: Option<i64>,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Stamp a claim set issued at `issued_at_millis` (Unix milliseconds)
    /// and expiring at `exp` (Unix seconds).
    pub fn stamp(set: ClaimSet, issued_at_millis: i64, exp: i64) -> Self {
        Self {
            sub: set.sub,
            session_id: set.session_id,
            jti: set.jti,
            roles: set.roles,
            typ: set.typ,
            full_name: set.full_name,
            iat: time::seconds_of_millis(issued_at_millis),
            iat_ms: Some(issued_at_millis),
            exp,
        }
    }

    /// Issue instant in Unix milliseconds. Tokens without `iatMs` count as
    /// issued at the start of their `iat` second.
    pub fn issued_at_millis(&self) -> i64 {
        self.iat_ms
            .unwrap_or_else(|| time::millis_of_seconds(self.iat))
    }

    /// Whether this is an access token.
    pub fn is_access(&self) -> bool {
        self.typ == TokenType::Access
    }
}

/// A payload read without checking the signature.
///
/// Every field is optional: the reader must decide which ones it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntrustedClaims {
    /// Subject.
    #[serde(default)]
    pub sub: Option<UserId>,
    /// Session id.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Token id.
    #[serde(default)]
    pub jti: Option<TokenId>,
    /// Roles.
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
    /// Token class.
    #[serde(default)]
    pub typ: Option<TokenType>,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Issued-at.
    #[serde(default)]
    pub iat: Option<i64>,
    /// Issued-at, milliseconds.
    #[serde(default)]
    pub iat_ms: Option<i64>,
    /// Expiry.
    #[serde(default)]
    pub exp: Option<i64>,
}
