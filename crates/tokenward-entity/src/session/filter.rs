//! Session lookup filters.

use serde::{Deserialize, Serialize};

use tokenward_core::types::{SessionId, UserId};

use super::model::Session;

/// Conjunction of optional equality filters over session records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Match a specific session.
    pub id: Option<SessionId>,
    /// Match sessions owned by a user.
    pub user_id: Option<UserId>,
}

impl SessionFilter {
    /// Filter on the owning user.
    pub fn by_user(user_id: UserId) -> Self {
        Self {
            id: None,
            user_id: Some(user_id),
        }
    }

    /// Filter on a session id owned by a given user.
    pub fn owned(id: SessionId, user_id: UserId) -> Self {
        Self {
            id: Some(id),
            user_id: Some(user_id),
        }
    }

    /// Whether a record satisfies every set condition.
    pub fn matches(&self, session: &Session) -> bool {
        self.id.is_none_or(|id| id == session.id)
            && self.user_id.is_none_or(|user_id| user_id == session.user_id)
    }
}
