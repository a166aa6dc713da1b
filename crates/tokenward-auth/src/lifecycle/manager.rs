//! Token lifecycle: login, per-request authentication, rotation, logout,
//! and password-change invalidation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use tokenward_core::config::{AuthConfig, RevocationPolicy, SessionConfig};
use tokenward_core::error::{AppError, AuthFailure};
use tokenward_core::result::AppResult;
use tokenward_core::traits::cache::CacheProvider;
use tokenward_core::types::pagination::{PageRequest, PageResponse};
use tokenward_core::types::sorting::SortField;
use tokenward_core::types::{SessionId, TokenId, UserId};
use tokenward_database::repositories::identity::IdentityProvider;
use tokenward_database::repositories::session::SessionRepository;
use tokenward_entity::session::{Session, SessionFilter, TokenPair};
use tokenward_entity::user::{ExternalProfile, Identity, Registration};

use crate::jwt::{ClaimSet, Claims, SignedToken, TokenCodec, TokenType, UntrustedClaims};
use crate::password::{PasswordHasher, PasswordValidator};
use crate::revocation::{RevocationStore, RevokeOutcome};
use crate::session::{RequestMeta, SessionRegistry, extract_device_info};
use crate::time::{self, Clock};

/// Result of a credential-based login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    /// Issued token pair.
    pub tokens: TokenPair,
    /// The identity that logged in.
    pub identity: Identity,
}

/// A freshly signed access/refresh pair, not yet recorded anywhere.
struct SignedPair {
    access: SignedToken,
    refresh: SignedToken,
}

/// Fields every presented token must carry.
struct TokenRef {
    session_id: SessionId,
    jti: TokenId,
    typ: Option<TokenType>,
    exp: Option<i64>,
}

impl TokenRef {
    fn from_untrusted(claims: UntrustedClaims) -> AppResult<Self> {
        match (claims.session_id, claims.jti) {
            (Some(session_id), Some(jti)) => Ok(Self {
                session_id,
                jti,
                typ: claims.typ,
                exp: claims.exp,
            }),
            _ => Err(AppError::unauthorized(AuthFailure::MalformedToken)),
        }
    }
}

/// Orchestrates token issuance, validation, rotation, and revocation over
/// the revocation store, the session registry, and the identity provider.
///
/// Holds no mutable state of its own; every call is an independent unit of
/// work and the manager may be shared freely between tasks. Store failures
/// propagate as infrastructure errors and are never reported as an
/// authentication failure.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    codec: TokenCodec,
    revocation: RevocationStore,
    sessions: SessionRegistry,
    identities: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
    validator: PasswordValidator,
    watermark_ttl: Duration,
}

impl std::fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("codec", &self.codec)
            .field("policy", &self.revocation.policy())
            .field("watermark_ttl", &self.watermark_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenLifecycleManager {
    /// Wires a manager from configuration and its collaborators.
    pub fn new(
        auth: &AuthConfig,
        session: &SessionConfig,
        cache: Arc<dyn CacheProvider>,
        sessions: Arc<dyn SessionRepository>,
        identities: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec: TokenCodec::new(auth),
            revocation: RevocationStore::new(cache, auth.revocation_policy),
            sessions: SessionRegistry::new(
                sessions,
                clock.clone(),
                auth.refresh_ttl(),
                session.clone(),
            ),
            identities,
            clock,
            hasher: PasswordHasher::new(),
            validator: PasswordValidator::new(auth),
            watermark_ttl: auth.longest_ttl(),
        }
    }

    /// The session registry this manager writes to.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// The revocation store this manager writes to.
    pub fn revocation(&self) -> &RevocationStore {
        &self.revocation
    }

    /// The token codec.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    // ── Login ───────────────────────────────────────────────────────

    /// Opens a session for an already authenticated identity and issues a
    /// token pair bound to it.
    ///
    /// An identity without an id or roles is rejected before any session
    /// is created.
    pub async fn issue(&self, identity: &Identity, meta: &RequestMeta) -> AppResult<TokenPair> {
        if !identity.is_complete() {
            warn!(user_id = %identity.id, "Login rejected: incomplete identity");
            return Err(AppError::unauthorized(AuthFailure::InvalidIdentity));
        }

        let session = self
            .sessions
            .create(identity.id, extract_device_info(meta))
            .await?;

        let now_ms = self.clock.now_millis();
        let now = time::seconds_of_millis(now_ms);
        let pair = self.sign_pair(identity, session.id, now_ms)?;
        self.revocation
            .set_active_session(session.id, time::remaining_ttl(pair.refresh.claims.exp, now))
            .await?;
        self.allow_pair(&pair, now).await?;

        info!(
            user_id = %identity.id,
            session_id = %session.id,
            ip = session.device_info.ip.as_deref().unwrap_or_default(),
            "Login successful"
        );
        pair.into_token_pair()
    }

    /// Local username/password login.
    pub async fn login_with_password(
        &self,
        username: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> AppResult<LoginResult> {
        let Some(identity) = self.identities.find_by_username(username).await? else {
            warn!(username, "Login rejected: unknown username");
            return Err(AppError::unauthorized(AuthFailure::InvalidCredentials));
        };

        if let Err(e) = self
            .hasher
            .verify(password, identity.password_hash.as_deref())
        {
            if e.is_unauthorized() {
                warn!(user_id = %identity.id, "Login rejected: wrong password");
            }
            return Err(e);
        }

        let tokens = self.issue(&identity, meta).await?;
        Ok(LoginResult { tokens, identity })
    }

    /// Login with the result of a completed OAuth handshake. The account is
    /// found by provider id, linked by email, or created.
    pub async fn login_external(
        &self,
        profile: &ExternalProfile,
        meta: &RequestMeta,
    ) -> AppResult<LoginResult> {
        let identity = self.identities.upsert_external(profile).await?;
        let tokens = self.issue(&identity, meta).await?;
        Ok(LoginResult { tokens, identity })
    }

    // ── Registration ────────────────────────────────────────────────

    /// Opens a local account. Email and username must be unused and the
    /// password must satisfy the password policy. No tokens are issued.
    pub async fn register(&self, registration: &Registration) -> AppResult<Identity> {
        let full_name = registration.full_name.trim();
        let email = registration.email.trim();
        if full_name.is_empty() {
            return Err(AppError::validation("Full name is required"));
        }
        if email.is_empty() {
            return Err(AppError::validation("Email is required"));
        }
        let username = registration
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        if self.identities.exists_by_email(email).await? {
            return Err(AppError::conflict("Email already exists"));
        }
        if let Some(username) = username {
            if self.identities.exists_by_username(username).await? {
                return Err(AppError::conflict("Username already exists"));
            }
        }

        self.validator.validate(&registration.password)?;
        let hash = self.hasher.hash(&registration.password)?;

        let mut identity = Identity::new(full_name);
        identity.email = Some(email.to_string());
        identity.username = username.map(str::to_string);
        identity.password_hash = Some(hash);

        let created = self.identities.create(&identity).await?;
        info!(user_id = %created.id, "User registered");
        Ok(created)
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Validates a presented token of either class.
    ///
    /// Rejects in order: unreadable or incomplete payload, bad signature,
    /// expiry, inactive session, revoked token id, issuance before the
    /// user's last password change. Never mutates state.
    pub async fn authenticate(&self, token: &str) -> AppResult<Claims> {
        self.authenticate_as(token, None).await
    }

    /// Validates a bearer credential, which must be an access token.
    pub async fn authenticate_access(&self, token: &str) -> AppResult<Claims> {
        self.authenticate_as(token, Some(TokenType::Access)).await
    }

    async fn authenticate_as(&self, token: &str, expected: Option<TokenType>) -> AppResult<Claims> {
        let untrusted = TokenCodec::decode(token)
            .ok_or_else(|| AppError::unauthorized(AuthFailure::MalformedToken))?;
        let (Some(_), Some(_), Some(_), Some(typ)) = (
            untrusted.sub,
            untrusted.session_id,
            untrusted.jti,
            untrusted.typ,
        ) else {
            return Err(AppError::unauthorized(AuthFailure::MalformedToken));
        };
        if expected.is_some_and(|want| want != typ) {
            return Err(AppError::unauthorized(AuthFailure::InvalidToken));
        }

        let claims = self.codec.verify(token, typ, self.clock.now_seconds())?;
        self.ensure_session_active(&claims).await?;
        if self.revocation.is_token_revoked(claims.jti).await? {
            warn!(user_id = %claims.sub, jti = %claims.jti, "Rejected revoked token");
            return Err(AppError::unauthorized(AuthFailure::TokenRevoked));
        }
        self.ensure_not_superseded(&claims).await?;
        Ok(claims)
    }

    async fn ensure_session_active(&self, claims: &Claims) -> AppResult<()> {
        if self.revocation.is_session_active(claims.session_id).await? {
            return Ok(());
        }
        warn!(
            user_id = %claims.sub,
            session_id = %claims.session_id,
            "Rejected token of inactive session"
        );
        Err(AppError::unauthorized(AuthFailure::SessionRevoked))
    }

    async fn ensure_not_superseded(&self, claims: &Claims) -> AppResult<()> {
        let watermark = self
            .revocation
            .get_password_change_watermark(claims.sub)
            .await?;
        match watermark {
            Some(watermark) if claims.issued_at_millis() < watermark => {
                warn!(
                    user_id = %claims.sub,
                    issued_at_ms = claims.issued_at_millis(),
                    watermark,
                    "Rejected token issued before password change"
                );
                Err(AppError::unauthorized(AuthFailure::TokenSuperseded))
            }
            _ => Ok(()),
        }
    }

    // ── Rotation ────────────────────────────────────────────────────

    /// Exchanges a refresh token for a new pair bound to the same session.
    ///
    /// The presented token is consumed, the active-session marker is
    /// re-armed, the session record is extended, and fresh roles are read
    /// from the identity provider. Under the denylist policy a refresh
    /// token that was already consumed revokes the whole session.
    pub async fn rotate(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let now_ms = self.clock.now_millis();
        let now = time::seconds_of_millis(now_ms);
        let claims = self.codec.verify(refresh_token, TokenType::Refresh, now)?;
        self.ensure_session_active(&claims).await?;
        self.ensure_not_superseded(&claims).await?;

        if self.revocation.policy() == RevocationPolicy::Allowlist
            && self.revocation.is_token_revoked(claims.jti).await?
        {
            warn!(user_id = %claims.sub, jti = %claims.jti, "Rejected revoked refresh token");
            return Err(AppError::unauthorized(AuthFailure::TokenRevoked));
        }

        let outcome = self
            .revocation
            .revoke_token(claims.jti, time::remaining_ttl(claims.exp, now))
            .await?;
        if outcome == RevokeOutcome::AlreadyRevoked {
            warn!(
                user_id = %claims.sub,
                session_id = %claims.session_id,
                jti = %claims.jti,
                "Refresh token reuse detected, revoking session"
            );
            self.revoke_session(claims.session_id).await?;
            return Err(AppError::unauthorized(AuthFailure::TokenRevoked));
        }

        let identity = match self.identities.find_by_id(claims.sub).await? {
            Some(identity) if identity.is_complete() => identity,
            Some(_) => return Err(AppError::unauthorized(AuthFailure::InvalidIdentity)),
            None => {
                warn!(user_id = %claims.sub, "Refresh rejected: user no longer exists");
                return Err(AppError::unauthorized(AuthFailure::UserNotFound));
            }
        };

        let pair = self.sign_pair(&identity, claims.session_id, now_ms)?;
        self.revocation
            .set_active_session(
                claims.session_id,
                time::remaining_ttl(pair.refresh.claims.exp, now),
            )
            .await?;

        let extended = self
            .sessions
            .update_expiry(claims.session_id, pair.refresh.expires_at()?)
            .await?;
        if extended.is_none() {
            warn!(
                user_id = %claims.sub,
                session_id = %claims.session_id,
                "Refresh rejected: session record is gone"
            );
            self.revocation
                .clear_active_session(claims.session_id)
                .await?;
            return Err(AppError::unauthorized(AuthFailure::SessionRevoked));
        }

        self.allow_pair(&pair, now).await?;

        info!(
            user_id = %claims.sub,
            session_id = %claims.session_id,
            "Token pair rotated"
        );
        pair.into_token_pair()
    }

    // ── Revocation ──────────────────────────────────────────────────

    /// Logout: revokes both presented tokens, clears the active marker of
    /// their session, and deletes the session record.
    ///
    /// The tokens are read without re-verification. All writes are issued
    /// concurrently and none is rolled back if another fails; the first
    /// failure is returned after every write has completed.
    pub async fn revoke(&self, access_token: &str, refresh_token: &str) -> AppResult<()> {
        let access = self.presented(access_token)?;
        let refresh = self.presented(refresh_token)?;
        let now = self.clock.now_seconds();

        let mut sessions = vec![access.session_id];
        if refresh.session_id != access.session_id {
            warn!(
                access_session = %access.session_id,
                refresh_session = %refresh.session_id,
                "Logout tokens belong to different sessions, revoking both"
            );
            sessions.push(refresh.session_id);
        }

        let (tokens, markers, records) = futures::join!(
            join_all(
                [&access, &refresh]
                    .into_iter()
                    .map(|token| self.revoke_presented(token, now))
            ),
            join_all(
                sessions
                    .iter()
                    .map(|&sid| self.revocation.clear_active_session(sid))
            ),
            join_all(sessions.iter().map(|&sid| self.sessions.delete(sid))),
        );

        let failures: Vec<AppError> = tokens
            .into_iter()
            .filter_map(Result::err)
            .chain(markers.into_iter().filter_map(Result::err))
            .chain(records.into_iter().filter_map(Result::err))
            .collect();

        for e in &failures {
            error!(error = %e, "Logout step failed");
        }
        match failures.into_iter().next() {
            Some(first) => Err(first),
            None => {
                info!(session_id = %access.session_id, "Logout completed");
                Ok(())
            }
        }
    }

    fn presented(&self, token: &str) -> AppResult<TokenRef> {
        TokenCodec::decode(token)
            .ok_or_else(|| AppError::unauthorized(AuthFailure::MalformedToken))
            .and_then(TokenRef::from_untrusted)
    }

    async fn revoke_presented(&self, token: &TokenRef, now: i64) -> AppResult<RevokeOutcome> {
        // Without a readable exp, cover the longest lifetime the class can have.
        let remaining = match (token.exp, token.typ) {
            (Some(exp), _) => time::remaining_ttl(exp, now),
            (None, Some(typ)) => self.codec.ttl(typ),
            (None, None) => self.watermark_ttl,
        };
        self.revocation.revoke_token(token.jti, remaining).await
    }

    /// Forcibly ends one session. Every token bound to it stops
    /// authenticating. Returns whether a session record existed.
    pub async fn revoke_session(&self, session_id: SessionId) -> AppResult<bool> {
        let (marker, record) = futures::join!(
            self.revocation.clear_active_session(session_id),
            self.sessions.delete(session_id),
        );
        marker?;
        let existed = record?;
        info!(session_id = %session_id, existed, "Session revoked");
        Ok(existed)
    }

    /// Forcibly ends every session of a user. Returns how many records were
    /// deleted.
    pub async fn revoke_all_sessions(&self, user_id: UserId) -> AppResult<usize> {
        let ids = self.sessions.delete_by_user(user_id).await?;
        let cleared = join_all(
            ids.iter()
                .map(|&sid| self.revocation.clear_active_session(sid)),
        )
        .await;
        cleared.into_iter().collect::<AppResult<Vec<()>>>()?;

        info!(user_id = %user_id, count = ids.len(), "All sessions revoked");
        Ok(ids.len())
    }

    // ── Password change ─────────────────────────────────────────────

    /// Rejects every token of `user_id` issued before now.
    ///
    /// The watermark is kept in Unix milliseconds and outlives the longest
    /// token class. Each call moves it strictly forward, so a token issued
    /// between two calls is rejected after the second even when the clock
    /// has not advanced. Returns the watermark in force.
    pub async fn invalidate_older_tokens(&self, user_id: UserId) -> AppResult<i64> {
        let now_ms = self.clock.now_millis();
        let existing = self
            .revocation
            .get_password_change_watermark(user_id)
            .await?;
        let watermark =
            existing.map_or(now_ms, |existing| now_ms.max(existing.saturating_add(1)));

        self.revocation
            .set_password_change_watermark(user_id, watermark, self.watermark_ttl)
            .await?;
        info!(user_id = %user_id, watermark, "Older tokens invalidated");
        Ok(watermark)
    }

    /// Changes a local password after checking the current one, then
    /// invalidates every token issued before the change.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<i64> {
        let identity = self
            .identities
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;

        if let Err(e) = self
            .hasher
            .verify(current_password, identity.password_hash.as_deref())
        {
            if e.is_unauthorized() {
                warn!(user_id = %user_id, "Password change rejected: wrong current password");
            }
            return Err(e);
        }
        self.validator
            .validate_not_same(current_password, new_password)?;
        self.validator.validate(new_password)?;

        let hash = self.hasher.hash(new_password)?;
        self.identities.update_password_hash(user_id, &hash).await?;
        info!(user_id = %user_id, "Password changed");

        self.invalidate_older_tokens(user_id).await
    }

    // ── Session views ───────────────────────────────────────────────

    /// Lists a user's live sessions.
    pub async fn list_sessions(
        &self,
        user_id: UserId,
        page: PageRequest,
        sort: Option<&SortField>,
    ) -> AppResult<PageResponse<Session>> {
        self.sessions
            .paginate(&SessionFilter::by_user(user_id), page, sort)
            .await
    }

    /// One of a user's live sessions. Sessions of other users are not found.
    pub async fn find_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> AppResult<Option<Session>> {
        self.sessions
            .find_one(&SessionFilter::owned(session_id, user_id))
            .await
    }

    // ── Internals ───────────────────────────────────────────────────

    fn sign_pair(
        &self,
        identity: &Identity,
        session_id: SessionId,
        now_ms: i64,
    ) -> AppResult<SignedPair> {
        let access = self.codec.sign(
            ClaimSet {
                sub: identity.id,
                session_id,
                jti: TokenId::new(),
                roles: identity.roles.clone(),
                typ: TokenType::Access,
                full_name: Some(identity.full_name.clone()),
            },
            now_ms,
        )?;
        let refresh = self.codec.sign(
            ClaimSet {
                sub: identity.id,
                session_id,
                jti: TokenId::new(),
                roles: identity.roles.clone(),
                typ: TokenType::Refresh,
                full_name: None,
            },
            now_ms,
        )?;
        Ok(SignedPair { access, refresh })
    }

    /// Allowlists both token ids when that policy is in force.
    async fn allow_pair(&self, pair: &SignedPair, now: i64) -> AppResult<()> {
        if self.revocation.policy() != RevocationPolicy::Allowlist {
            return Ok(());
        }
        let (access, refresh) = futures::join!(
            self.revocation.whitelist_token(
                pair.access.claims.jti,
                time::remaining_ttl(pair.access.claims.exp, now),
            ),
            self.revocation.whitelist_token(
                pair.refresh.claims.jti,
                time::remaining_ttl(pair.refresh.claims.exp, now),
            ),
        );
        access?;
        refresh
    }
}

impl SignedPair {
    fn into_token_pair(self) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access_expires_at: self.access.expires_at()?,
            refresh_expires_at: self.refresh.expires_at()?,
            session_id: self.access.claims.session_id,
            access_token: self.access.token,
            refresh_token: self.refresh.token,
        })
    }
}
