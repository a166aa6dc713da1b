//! Identity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tokenward_core::types::UserId;

use super::role::Role;

/// A user identity as seen by the token lifecycle.
///
/// Local and OAuth-derived accounts share this shape; provider linkage is
/// carried by the optional `google_id` / `facebook_id` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Unique user identifier.
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Local login name.
    pub username: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Granted roles.
    pub roles: Vec<Role>,
    /// Linked Google account id.
    pub google_id: Option<String>,
    /// Linked Facebook account id.
    pub facebook_id: Option<String>,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// Argon2 password hash, absent for OAuth-only accounts.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    /// When the identity was created.
    pub created_at: DateTime<Utc>,
    /// When the identity was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Build a local account with the default `user` role.
    pub fn new(full_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            full_name: full_name.into(),
            username: None,
            email: None,
            roles: vec![Role::User],
            google_id: None,
            facebook_id: None,
            avatar: None,
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record carries everything needed to mint tokens.
    pub fn is_complete(&self) -> bool {
        !self.id.is_nil() && !self.roles.is_empty()
    }

    /// Whether the identity holds a role.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
