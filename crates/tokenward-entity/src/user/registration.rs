//! Local account registration input.

use serde::Deserialize;

/// What a caller supplies to open a local account.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Display name.
    pub full_name: String,
    /// Email address; must not belong to another account.
    pub email: String,
    /// Login name for password login; must not belong to another account.
    #[serde(default)]
    pub username: Option<String>,
    /// Plain-text password, hashed before it is stored.
    pub password: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
