//! Revocation store over a TTL key-value backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use tokenward_cache::keys;
use tokenward_core::config::RevocationPolicy;
use tokenward_core::error::AppError;
use tokenward_core::result::AppResult;
use tokenward_core::traits::cache::CacheProvider;
use tokenward_core::types::{SessionId, TokenId, UserId};

const MARKER: &str = "1";

/// Result of revoking a token identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// This call moved the token to revoked.
    Revoked,
    /// The token was already revoked by an earlier call.
    AlreadyRevoked,
}

/// Revocation state for sessions, token identifiers, and users.
///
/// Every entry expires on its own. Writes with a zero TTL are skipped: the
/// thing they would govern is already dead. Absence of a key is a normal
/// answer, never an error; backend failures propagate unchanged.
#[derive(Debug, Clone)]
pub struct RevocationStore {
    cache: Arc<dyn CacheProvider>,
    policy: RevocationPolicy,
}

impl RevocationStore {
    /// Create a store with the given policy.
    pub fn new(cache: Arc<dyn CacheProvider>, policy: RevocationPolicy) -> Self {
        Self { cache, policy }
    }

    /// The configured tracking policy.
    pub fn policy(&self) -> RevocationPolicy {
        self.policy
    }

    /// Mark a session as permitted to authenticate for `ttl`.
    pub async fn set_active_session(&self, session_id: SessionId, ttl: Duration) -> AppResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.cache
            .set(&keys::active_session(session_id), MARKER, ttl)
            .await
    }

    /// Whether the session's active marker is present.
    pub async fn is_session_active(&self, session_id: SessionId) -> AppResult<bool> {
        self.cache.exists(&keys::active_session(session_id)).await
    }

    /// Remove a session's active marker.
    pub async fn clear_active_session(&self, session_id: SessionId) -> AppResult<()> {
        self.cache.delete(&keys::active_session(session_id)).await
    }

    /// Record a token identifier as valid for `ttl`.
    pub async fn whitelist_token(&self, jti: TokenId, ttl: Duration) -> AppResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.cache
            .set(&keys::token_whitelist(jti), MARKER, ttl)
            .await
    }

    /// Whether the token identifier is on the allowlist.
    pub async fn is_token_whitelisted(&self, jti: TokenId) -> AppResult<bool> {
        self.cache.exists(&keys::token_whitelist(jti)).await
    }

    /// Whether the token identifier is on the denylist.
    pub async fn is_token_blacklisted(&self, jti: TokenId) -> AppResult<bool> {
        self.cache.exists(&keys::token_blacklist(jti)).await
    }

    /// Whether the token identifier is revoked under the configured policy.
    pub async fn is_token_revoked(&self, jti: TokenId) -> AppResult<bool> {
        match self.policy {
            RevocationPolicy::Denylist => self.is_token_blacklisted(jti).await,
            RevocationPolicy::Allowlist => Ok(!self.is_token_whitelisted(jti).await?),
        }
    }

    /// Revoke a token identifier.
    ///
    /// Under the denylist policy a marker is written with set-if-absent for
    /// `remaining` (the token's unexpired lifetime), and a marker that was
    /// already there is reported as [`RevokeOutcome::AlreadyRevoked`]. Under
    /// the allowlist policy the allowlist entry is deleted; that cannot tell
    /// first from repeat revocations, so it always reports `Revoked`.
    pub async fn revoke_token(&self, jti: TokenId, remaining: Duration) -> AppResult<RevokeOutcome> {
        match self.policy {
            RevocationPolicy::Denylist => {
                if remaining.is_zero() {
                    return Ok(RevokeOutcome::Revoked);
                }
                let inserted = self
                    .cache
                    .set_nx(&keys::token_blacklist(jti), MARKER, remaining)
                    .await?;
                debug!(%jti, inserted, "Denylisted token");
                Ok(if inserted {
                    RevokeOutcome::Revoked
                } else {
                    RevokeOutcome::AlreadyRevoked
                })
            }
            RevocationPolicy::Allowlist => {
                self.cache.delete(&keys::token_whitelist(jti)).await?;
                debug!(%jti, "Removed token from allowlist");
                Ok(RevokeOutcome::Revoked)
            }
        }
    }

    /// Store the Unix millisecond before which a user's tokens are rejected.
    pub async fn set_password_change_watermark(
        &self,
        user_id: UserId,
        unix_millis: i64,
        ttl: Duration,
    ) -> AppResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.cache
            .set(
                &keys::token_iat_available(user_id),
                &unix_millis.to_string(),
                ttl,
            )
            .await
    }

    /// The user's watermark in Unix milliseconds, if one is in force.
    pub async fn get_password_change_watermark(&self, user_id: UserId) -> AppResult<Option<i64>> {
        let Some(raw) = self.cache.get(&keys::token_iat_available(user_id)).await? else {
            return Ok(None);
        };
        raw.parse::<i64>().map(Some).map_err(|e| {
            AppError::cache(format!(
                "Corrupt password-change watermark for user {user_id}: {e}"
            ))
        })
    }
}
