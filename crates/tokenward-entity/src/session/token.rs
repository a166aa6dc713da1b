//! Token pair returned to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tokenward_core::types::SessionId;

/// An access + refresh token pair bound to one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// The session both tokens belong to.
    pub session_id: SessionId,
    /// Access token expiration.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiration.
    pub refresh_expires_at: DateTime<Utc>,
}
