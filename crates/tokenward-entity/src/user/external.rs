//! Identity claims produced by an OAuth provider handshake.

use serde::{Deserialize, Serialize};

/// Supported external identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalProvider {
    /// Google OAuth 2.0.
    Google,
    /// Facebook Login.
    Facebook,
}

impl ExternalProvider {
    /// Name of the identity column holding this provider's account id.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Google => "google_id",
            Self::Facebook => "facebook_id",
        }
    }
}

/// The resulting claims of a completed OAuth handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProfile {
    /// Which provider vouched for the profile.
    pub provider: ExternalProvider,
    /// The provider's stable account id.
    pub external_id: String,
    /// Email reported by the provider.
    pub email: Option<String>,
    /// Display name reported by the provider.
    pub full_name: String,
    /// Avatar URL reported by the provider.
    pub avatar: Option<String>,
}
