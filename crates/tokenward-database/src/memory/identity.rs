//! In-memory identity provider.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use tokenward_core::error::AppError;
use tokenward_core::result::AppResult;
use tokenward_core::types::UserId;
use tokenward_entity::user::{ExternalProfile, ExternalProvider, Identity};

use crate::repositories::identity::IdentityProvider;

/// Identity provider held in a map behind an async lock.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    users: RwLock<HashMap<UserId, Identity>>,
}

fn same_text(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| a.eq_ignore_ascii_case(b))
}

fn external_id(identity: &Identity, provider: ExternalProvider) -> Option<&str> {
    match provider {
        ExternalProvider::Google => identity.google_id.as_deref(),
        ExternalProvider::Facebook => identity.facebook_id.as_deref(),
    }
}

fn username_of(identity: &Identity) -> Option<&str> {
    identity.username.as_deref()
}

fn email_of(identity: &Identity) -> Option<&str> {
    identity.email.as_deref()
}

/// Whether another identity already uses the candidate's value of `field`.
fn clashes(
    users: &HashMap<UserId, Identity>,
    candidate: &Identity,
    field: fn(&Identity) -> Option<&str>,
) -> bool {
    field(candidate).is_some_and(|value| {
        users
            .values()
            .any(|u| u.id != candidate.id && same_text(field(u), value))
    })
}

fn check_unique(users: &HashMap<UserId, Identity>, identity: &Identity) -> AppResult<()> {
    if clashes(users, identity, username_of) {
        return Err(AppError::conflict("Username already exists"));
    }
    if clashes(users, identity, email_of) {
        return Err(AppError::conflict("Email already exists"));
    }
    Ok(())
}

fn link(identity: &mut Identity, profile: &ExternalProfile) {
    let slot = match profile.provider {
        ExternalProvider::Google => &mut identity.google_id,
        ExternalProvider::Facebook => &mut identity.facebook_id,
    };
    *slot = Some(profile.external_id.clone());
    if identity.avatar.is_none() {
        identity.avatar = profile.avatar.clone();
    }
    identity.updated_at = Utc::now();
}

impl InMemoryIdentityProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an identity, replacing any with the same id.
    pub async fn insert(&self, identity: Identity) -> AppResult<()> {
        let mut users = self.users.write().await;
        check_unique(&users, &identity)?;
        users.insert(identity.id, identity);
        Ok(())
    }

    /// Remove an identity.
    pub async fn remove(&self, id: UserId) -> bool {
        self.users.write().await.remove(&id).is_some()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<Identity>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<Identity>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| same_text(username_of(u), username))
            .cloned())
    }

    async fn exists_by_email(&self, email: &str) -> AppResult<bool> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|u| same_text(email_of(u), email)))
    }

    async fn exists_by_username(&self, username: &str) -> AppResult<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn create(&self, identity: &Identity) -> AppResult<Identity> {
        let mut users = self.users.write().await;
        if users.contains_key(&identity.id) {
            return Err(AppError::conflict(format!("User {} already exists", identity.id)));
        }
        check_unique(&users, identity)?;
        users.insert(identity.id, identity.clone());
        Ok(identity.clone())
    }

    async fn update_password_hash(&self, id: UserId, hash: &str) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.password_hash = Some(hash.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_external(&self, profile: &ExternalProfile) -> AppResult<Identity> {
        // One write lock for the whole lookup-or-create keeps it idempotent
        // under concurrent calls.
        let mut users = self.users.write().await;

        if let Some(user) = users
            .values()
            .find(|u| external_id(u, profile.provider) == Some(profile.external_id.as_str()))
        {
            return Ok(user.clone());
        }

        if let Some(email) = profile.email.as_deref() {
            if let Some(user) = users.values_mut().find(|u| {
                same_text(u.email.as_deref(), email) && external_id(u, profile.provider).is_none()
            }) {
                link(user, profile);
                return Ok(user.clone());
            }
        }

        let mut identity = Identity::new(profile.full_name.clone());
        identity.email = profile.email.clone();
        link(&mut identity, profile);
        users.insert(identity.id, identity.clone());
        Ok(identity)
    }
}
