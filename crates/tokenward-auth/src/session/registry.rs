//! Session registry: the lifecycle-facing view of durable session records.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use tokenward_core::config::SessionConfig;
use tokenward_core::result::AppResult;
use tokenward_core::types::pagination::{PageRequest, PageResponse};
use tokenward_core::types::sorting::SortField;
use tokenward_core::types::{SessionId, UserId};
use tokenward_database::repositories::session::{SessionOrder, SessionRepository};
use tokenward_entity::session::{CreateSession, DeviceInfo, Session, SessionFilter};

use crate::time::{self, Clock};

/// Creates, looks up, extends, and deletes session records.
///
/// Records live for the refresh-token lifetime from creation; refresh
/// extends them and logout deletes them. Expired records are invisible to
/// reads and are purged by [`super::cleanup::SessionCleanup`].
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    repo: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    config: SessionConfig,
}

impl SessionRegistry {
    /// Create a registry whose sessions live for `session_ttl`.
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
        config: SessionConfig,
    ) -> Self {
        Self {
            repo,
            clock,
            session_ttl,
            config,
        }
    }

    /// Lifetime given to new sessions.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Allocate a new session for a user.
    pub async fn create(&self, user_id: UserId, device_info: DeviceInfo) -> AppResult<Session> {
        let now = self.clock.now();
        let data = CreateSession {
            user_id,
            device_info,
            expires_at: time::add_ttl(now, self.session_ttl)?,
        };
        let session = self.repo.create(&data, now).await?;
        debug!(session_id = %session.id, user_id = %user_id, "Session created");
        Ok(session)
    }

    /// Find a live session by id.
    pub async fn find_by_id(&self, id: SessionId) -> AppResult<Option<Session>> {
        self.repo.find_by_id(id, self.clock.now()).await
    }

    /// Find the first live session matching a filter.
    pub async fn find_one(&self, filter: &SessionFilter) -> AppResult<Option<Session>> {
        self.repo.find_one(filter, self.clock.now()).await
    }

    /// List live sessions matching a filter.
    ///
    /// The page size is capped by configuration; `sort` defaults to newest
    /// first and is rejected if it names a field sessions cannot be
    /// ordered by.
    pub async fn paginate(
        &self,
        filter: &SessionFilter,
        page: PageRequest,
        sort: Option<&SortField>,
    ) -> AppResult<PageResponse<Session>> {
        let order = sort
            .map(SessionOrder::try_from)
            .transpose()?
            .unwrap_or_default();
        let page = page.capped(self.config.max_page_size);
        self.repo
            .paginate(filter, &page, order, self.clock.now())
            .await
    }

    /// A first page using the configured default size.
    pub fn default_page(&self) -> PageRequest {
        PageRequest::new(1, self.config.default_page_size)
    }

    /// Move a session's expiry to `expires_at` unless it is already later.
    pub async fn update_expiry(
        &self,
        id: SessionId,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        self.repo
            .update_expiry(id, expires_at, self.clock.now())
            .await
    }

    /// Delete a session record.
    pub async fn delete(&self, id: SessionId) -> AppResult<bool> {
        self.repo.delete(id).await
    }

    /// Delete every session of a user.
    pub async fn delete_by_user(&self, user_id: UserId) -> AppResult<Vec<SessionId>> {
        self.repo.delete_by_user(user_id).await
    }

    /// Purge records that have passed their expiry.
    pub async fn delete_expired(&self) -> AppResult<u64> {
        self.repo.delete_expired(self.clock.now()).await
    }
}
