//! Shared fixtures for token lifecycle integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use tokenward_auth::jwt::Claims;
use tokenward_auth::{Clock, ManualClock, PasswordHasher, RequestMeta, TokenCodec, TokenLifecycleManager};
use tokenward_core::config::{AuthConfig, RevocationPolicy, SessionConfig};
use tokenward_core::error::AppError;
use tokenward_core::result::AppResult;
use tokenward_core::traits::cache::CacheProvider;
use tokenward_database::{InMemoryIdentityProvider, InMemorySessionRepository};
use tokenward_entity::session::TokenPair;
use tokenward_entity::user::Identity;

/// Start of every test clock.
pub const T0: i64 = 1_700_000_000;
/// [`T0`] in Unix milliseconds.
pub const T0_MS: i64 = T0 * 1000;
/// Access token lifetime used by the fixtures.
pub const ACCESS_TTL: u64 = 900;
/// Refresh token lifetime used by the fixtures.
pub const REFRESH_TTL: u64 = 604_800;
/// A password that satisfies the default policy.
pub const PASSWORD: &str = "Quartz-Falcon-7-Meridian";

/// A key-value store whose entries expire on a [`ManualClock`].
#[derive(Debug)]
pub struct ClockedCache {
    clock: Arc<ManualClock>,
    entries: Mutex<HashMap<String, (String, i64)>>,
}

impl ClockedCache {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn deadline(&self, ttl: Duration) -> i64 {
        self.now_millis()
            .saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }

    /// Keys that have not yet expired.
    pub fn live_keys(&self) -> Vec<String> {
        let now = self.now_millis();
        let entries = self.entries.lock().unwrap();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, (_, deadline))| *deadline > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remaining TTL of a key, if it is live.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = self.now_millis();
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|(_, deadline)| *deadline > now)
            .map(|(_, deadline)| Duration::from_millis((deadline - now) as u64))
    }
}

#[async_trait]
impl CacheProvider for ClockedCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = self.now_millis();
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, deadline)| *deadline > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let deadline = self.deadline(ttl);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let now = self.now_millis();
        let deadline = self.deadline(ttl);
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key).is_some_and(|(_, d)| *d > now) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), deadline));
        Ok(true)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

/// A store that is always unreachable.
#[derive(Debug, Default)]
pub struct UnreachableCache;

#[async_trait]
impl CacheProvider for UnreachableCache {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::cache("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
        Err(AppError::cache("connection refused"))
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Err(AppError::cache("connection refused"))
    }

    async fn exists(&self, _key: &str) -> AppResult<bool> {
        Err(AppError::cache("connection refused"))
    }

    async fn set_nx(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<bool> {
        Err(AppError::cache("connection refused"))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Err(AppError::cache("connection refused"))
    }
}

/// Auth configuration shared by every fixture.
pub fn auth_config(policy: RevocationPolicy) -> AuthConfig {
    AuthConfig {
        access_secret: "integration-access-secret".into(),
        refresh_secret: "integration-refresh-secret".into(),
        access_ttl_seconds: ACCESS_TTL,
        refresh_ttl_seconds: REFRESH_TTL,
        revocation_policy: policy,
        password_min_length: 8,
        password_max_length: 100,
    }
}

/// A manager wired to in-memory stores and a manual clock.
pub struct TestApp {
    pub manager: TokenLifecycleManager,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<ClockedCache>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub identities: Arc<InMemoryIdentityProvider>,
    pub config: AuthConfig,
}

impl TestApp {
    pub fn new(policy: RevocationPolicy) -> Self {
        let clock = Arc::new(ManualClock::at_seconds(T0));
        let cache = Arc::new(ClockedCache::new(clock.clone()));
        let sessions = Arc::new(InMemorySessionRepository::new());
        let identities = Arc::new(InMemoryIdentityProvider::new());
        let config = auth_config(policy);

        let manager = TokenLifecycleManager::new(
            &config,
            &SessionConfig::default(),
            cache.clone(),
            sessions.clone(),
            identities.clone(),
            clock.clone(),
        );

        Self {
            manager,
            clock,
            cache,
            sessions,
            identities,
            config,
        }
    }

    /// A manager over the same session and identity stores but an
    /// unreachable key-value store.
    pub fn with_unreachable_cache(&self) -> TokenLifecycleManager {
        TokenLifecycleManager::new(
            &self.config,
            &SessionConfig::default(),
            Arc::new(UnreachableCache),
            self.sessions.clone(),
            self.identities.clone(),
            self.clock.clone(),
        )
    }

    /// Register a local account with [`PASSWORD`].
    pub async fn create_user(&self, username: &str) -> Identity {
        let mut identity = Identity::new(format!("{username} Tester"));
        identity.username = Some(username.to_string());
        identity.email = Some(format!("{username}@example.com"));
        identity.password_hash = Some(PasswordHasher::new().hash(PASSWORD).unwrap());
        self.identities.insert(identity.clone()).await.unwrap();
        identity
    }

    /// Register an account without a password.
    pub async fn create_passwordless_user(&self, username: &str) -> Identity {
        let mut identity = Identity::new(format!("{username} Tester"));
        identity.username = Some(username.to_string());
        self.identities.insert(identity.clone()).await.unwrap();
        identity
    }

    pub async fn login(&self, identity: &Identity) -> TokenPair {
        self.manager
            .issue(identity, &RequestMeta::with_user_agent("integration-test"))
            .await
            .unwrap()
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    pub fn advance_millis(&self, millis: u64) {
        self.clock.advance(Duration::from_millis(millis));
    }
}

/// Read a token's payload without verification.
pub fn peek(token: &str) -> Claims {
    let payload = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

/// A structurally valid token with an arbitrary JSON payload and a bogus
/// signature.
pub fn forge(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

/// Untrusted decode that must succeed.
pub fn untrusted(token: &str) -> tokenward_auth::jwt::UntrustedClaims {
    TokenCodec::decode(token).unwrap()
}
